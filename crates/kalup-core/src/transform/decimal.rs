//! Fixed-point decimal transform.
//!
//! A decimal is stored as a scaled integer: `trunc(value * 10^precision)`,
//! packed with the declared width, signedness, and byte order. Unpack divides
//! back by the scale factor. The transform is deliberately lossy but
//! canonical: round-trips are exact only up to the declared precision.

use crate::error::{Error, Result};
use crate::transform::int::sign_extend;
use crate::transform::{ByteOrder, IntTransform, Packer, Size, Transform, Unpacker, Width};
use crate::value::Value;

/// Maximum precision whose scale factor still fits an `i64`
const MAX_PRECISION: u32 = 18;

/// Fixed-point decimal stored as a scaled integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalTransform {
    int: IntTransform,
    precision: u32,
}

impl DecimalTransform {
    /// Creates a decimal transform; fails if `precision` exceeds 18 digits
    pub fn new(width: Width, order: ByteOrder, signed: bool, precision: u32) -> Result<Self> {
        if precision > MAX_PRECISION {
            return Err(Error::schema(format!(
                "decimal precision {} exceeds the maximum of {}",
                precision, MAX_PRECISION
            )));
        }
        Ok(Self {
            int: IntTransform::new(width, order, signed),
            precision,
        })
    }

    /// Declared number of fractional digits
    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn factor(&self) -> f64 {
        10f64.powi(self.precision as i32)
    }
}

impl Transform for DecimalTransform {
    fn kind(&self) -> String {
        format!(
            "decimal{}.{} ({})",
            self.int.width().bits(),
            self.precision,
            self.int.order()
        )
    }

    fn size(&self) -> Size {
        self.int.size()
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let x = value.as_f64().ok_or_else(|| {
            Error::encoding(
                dst.path(),
                self.kind(),
                format!("expected a number, got {}", value.type_name()),
            )
        })?;
        if !x.is_finite() {
            return Err(Error::encoding(
                dst.path(),
                self.kind(),
                format!("cannot scale non-finite value {}", x),
            ));
        }

        let scaled = (x * self.factor()).trunc();
        let out_of_range = if self.int.is_signed() {
            scaled < self.int.min_signed() as f64 || scaled > self.int.max_signed() as f64
        } else {
            scaled < 0.0 || scaled > self.int.max_unsigned() as f64
        };
        if out_of_range {
            return Err(Error::encoding(
                dst.path(),
                self.kind(),
                format!("value {} is out of range", x),
            ));
        }

        let raw = if self.int.is_signed() {
            scaled as i64 as u64
        } else {
            scaled as u64
        };
        let (buf, n) = self.int.encode_raw(raw);
        dst.put_slice(&buf[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let raw = self.int.decode_raw(src.take(self.int.width().nbytes())?);
        let scaled = if self.int.is_signed() {
            sign_extend(raw, self.int.width().bits()) as f64
        } else {
            raw as f64
        };
        Ok(Value::Float(scaled / self.factor()))
    }
}

//! Rational transform: numerator and denominator as adjacent 4-byte integers.
//!
//! Zero uses the `(0, 0)` "unknown value" convention, so unpacking a pair of
//! zeros yields zero instead of a division error. Values normalize to lowest
//! terms on construction, which makes the transform canonical rather than
//! strictly lossless.

use crate::error::{Error, Result};
use crate::transform::int::sign_extend;
use crate::transform::{ByteOrder, IntTransform, Packer, Size, Transform, Unpacker, Width};
use crate::value::{Rational, Value};

/// Numerator/denominator pair of 4-byte integers sharing one byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RationalTransform {
    int: IntTransform,
}

impl RationalTransform {
    /// Creates a rational transform over two 4-byte integers
    pub const fn new(order: ByteOrder, signed: bool) -> Self {
        Self {
            int: IntTransform::new(Width::B4, order, signed),
        }
    }

    fn read_component(&self, src: &mut Unpacker<'_>) -> Result<i64> {
        let raw = self.int.decode_raw(src.take(self.int.width().nbytes())?);
        Ok(if self.int.is_signed() {
            sign_extend(raw, self.int.width().bits())
        } else {
            raw as i64
        })
    }

    fn component(&self, value: &Value, v: i64, path: &str) -> Result<u64> {
        let in_range = if self.int.is_signed() {
            v >= self.int.min_signed() && v <= self.int.max_signed()
        } else {
            v >= 0 && v as u64 <= self.int.max_unsigned()
        };
        if !in_range {
            return Err(Error::encoding(
                path,
                self.kind(),
                format!("component of {} is out of range", value),
            ));
        }
        Ok(v as u64)
    }
}

impl Transform for RationalTransform {
    fn kind(&self) -> String {
        let prefix = if self.int.is_signed() { "i" } else { "u" };
        format!("{}rational ({})", prefix, self.int.order())
    }

    fn size(&self) -> Size {
        Size::Fixed(8)
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let r = match value {
            Value::Rational(r) => *r,
            Value::Int(v) => Rational::new(*v, 1),
            Value::UInt(v) => {
                let v = i64::try_from(*v).map_err(|_| {
                    Error::encoding(dst.path(), self.kind(), "numerator is out of range")
                })?;
                Rational::new(v, 1)
            }
            _ => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected a rational, got {}", value.type_name()),
                ))
            }
        };

        let path = dst.path();
        let numer = self.component(value, r.numer(), &path)?;
        let denom = self.component(value, r.denom(), &path)?;

        let (buf, n) = self.int.encode_raw(numer);
        dst.put_slice(&buf[..n]);
        let (buf, n) = self.int.encode_raw(denom);
        dst.put_slice(&buf[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let numer = self.read_component(src)?;
        let denom = self.read_component(src)?;
        Ok(Value::Rational(Rational::new(numer, denom)))
    }
}

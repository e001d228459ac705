//! IEEE-754 float transforms.
//!
//! Unpack is total: any bit pattern is a valid float, NaN and the infinities
//! included. Half-precision values go through the `half` crate and widen to
//! `f64` on unpack.

use half::f16;

use crate::error::{Error, Result};
use crate::transform::int::{read_uint, write_uint};
use crate::transform::{ByteOrder, Packer, Size, Transform, Unpacker};
use crate::value::Value;

/// Widths of the IEEE-754 interchange formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    /// binary16, two bytes
    Half,
    /// binary32, four bytes
    Single,
    /// binary64, eight bytes
    Double,
}

impl FloatWidth {
    /// Width in bytes
    pub const fn nbytes(self) -> usize {
        match self {
            FloatWidth::Half => 2,
            FloatWidth::Single => 4,
            FloatWidth::Double => 8,
        }
    }
}

/// Byte-order-aware IEEE-754 float transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatTransform {
    width: FloatWidth,
    order: ByteOrder,
}

impl FloatTransform {
    /// Creates a float transform
    pub const fn new(width: FloatWidth, order: ByteOrder) -> Self {
        Self { width, order }
    }

    /// Declared width
    pub fn width(&self) -> FloatWidth {
        self.width
    }
}

impl Transform for FloatTransform {
    fn kind(&self) -> String {
        let bits = self.width.nbytes() * 8;
        format!("f{} ({})", bits, self.order)
    }

    fn size(&self) -> Size {
        Size::Fixed(self.width.nbytes())
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let x = value.as_f64().ok_or_else(|| {
            Error::encoding(
                dst.path(),
                self.kind(),
                format!("expected a number, got {}", value.type_name()),
            )
        })?;

        let raw: u64 = match self.width {
            FloatWidth::Half => u64::from(f16::from_f64(x).to_bits()),
            FloatWidth::Single => u64::from((x as f32).to_bits()),
            FloatWidth::Double => x.to_bits(),
        };

        let mut out = [0u8; 8];
        let n = self.width.nbytes();
        write_uint(raw, &mut out[..n], self.order);
        dst.put_slice(&out[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let raw = read_uint(src.take(self.width.nbytes())?, self.order);
        let x = match self.width {
            FloatWidth::Half => f16::from_bits(raw as u16).to_f64(),
            FloatWidth::Single => f64::from(f32::from_bits(raw as u32)),
            FloatWidth::Double => f64::from_bits(raw),
        };
        Ok(Value::Float(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{pack, unpack};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_double_round_trip() {
        let t = FloatTransform::new(FloatWidth::Double, ByteOrder::Big);
        let packed = pack(&Value::Float(3.141592653589793), &t).unwrap();
        assert_eq!(packed.len(), 8);
        assert_eq!(unpack(&t, &packed).unwrap(), Value::Float(3.141592653589793));
    }

    #[test]
    fn test_single_known_bits() {
        let t = FloatTransform::new(FloatWidth::Single, ByteOrder::Big);
        // 1.0f32 == 0x3F800000
        assert_eq!(&pack(&Value::Float(1.0), &t).unwrap()[..], b"\x3F\x80\x00\x00");
        assert_eq!(unpack(&t, b"\x3F\x80\x00\x00").unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_half_round_trip() {
        let t = FloatTransform::new(FloatWidth::Half, ByteOrder::Little);
        let packed = pack(&Value::Float(0.5), &t).unwrap();
        assert_eq!(packed.len(), 2);
        assert_eq!(unpack(&t, &packed).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_unpack_is_total() {
        let t = FloatTransform::new(FloatWidth::Single, ByteOrder::Big);
        // quiet NaN pattern decodes without error
        let v = unpack(&t, b"\x7F\xC0\x00\x00").unwrap();
        match v {
            Value::Float(x) => assert!(x.is_nan()),
            other => panic!("expected a float, got {:?}", other),
        }

        let v = unpack(&t, b"\x7F\x80\x00\x00").unwrap();
        assert_eq!(v, Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_integer_values_accepted() {
        let t = FloatTransform::new(FloatWidth::Double, ByteOrder::Big);
        let packed = pack(&Value::Int(-3), &t).unwrap();
        assert_eq!(unpack(&t, &packed).unwrap(), Value::Float(-3.0));
    }

    #[test]
    fn test_non_number_rejected() {
        let t = FloatTransform::new(FloatWidth::Double, ByteOrder::Big);
        assert!(pack(&Value::Bytes(vec![1]), &t).is_err());
    }
}

//! Fixed-width integer transforms.
//!
//! The integer transform is the workhorse primitive: every enum, flag,
//! decimal, rational, bit-field store, and size field is backed by one.

use crate::error::{Error, Result};
use crate::transform::{ByteOrder, Packer, Size, Transform, Unpacker, Width};
use crate::value::Value;

/// Fixed-width, byte-order-aware integer transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntTransform {
    width: Width,
    order: ByteOrder,
    signed: bool,
}

impl IntTransform {
    /// Creates an integer transform
    pub const fn new(width: Width, order: ByteOrder, signed: bool) -> Self {
        Self {
            width,
            order,
            signed,
        }
    }

    /// Creates an unsigned integer transform
    pub const fn unsigned(width: Width, order: ByteOrder) -> Self {
        Self::new(width, order, false)
    }

    /// Creates a signed integer transform
    pub const fn signed(width: Width, order: ByteOrder) -> Self {
        Self::new(width, order, true)
    }

    /// Declared width
    pub fn width(&self) -> Width {
        self.width
    }

    /// Declared byte order
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// True for the signed variant
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub(crate) fn max_unsigned(&self) -> u64 {
        match self.width {
            Width::B8 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }

    pub(crate) fn min_signed(&self) -> i64 {
        match self.width {
            Width::B8 => i64::MIN,
            w => -(1i64 << (w.bits() - 1)),
        }
    }

    pub(crate) fn max_signed(&self) -> i64 {
        match self.width {
            Width::B8 => i64::MAX,
            w => (1i64 << (w.bits() - 1)) - 1,
        }
    }

    /// Encodes a raw two's-complement value; the caller has range-checked it
    pub(crate) fn encode_raw(&self, raw: u64) -> ([u8; 8], usize) {
        let n = self.width.nbytes();
        let mut out = [0u8; 8];
        write_uint(raw, &mut out[..n], self.order);
        (out, n)
    }

    /// Decodes `width` raw bytes to an unsigned value without sign extension
    pub(crate) fn decode_raw(&self, raw: &[u8]) -> u64 {
        read_uint(raw, self.order)
    }

    /// Decodes `width` raw bytes to the transform's value domain
    pub(crate) fn decode_value(&self, raw: &[u8]) -> Value {
        let v = self.decode_raw(raw);
        if self.signed {
            Value::Int(sign_extend(v, self.width.bits()))
        } else {
            Value::UInt(v)
        }
    }

    /// Range-checks and converts a value to its raw two's-complement form
    pub(crate) fn to_raw(&self, value: &Value, path: &str) -> Result<u64> {
        if self.signed {
            let v = match value {
                Value::Int(v) => *v,
                Value::UInt(v) => i64::try_from(*v).map_err(|_| self.range_error(path, value))?,
                _ => return Err(self.type_error(path, value)),
            };
            if v < self.min_signed() || v > self.max_signed() {
                return Err(self.range_error(path, value));
            }
            Ok(v as u64)
        } else {
            let v = match value {
                Value::UInt(v) => *v,
                Value::Int(v) => u64::try_from(*v).map_err(|_| self.range_error(path, value))?,
                _ => return Err(self.type_error(path, value)),
            };
            if v > self.max_unsigned() {
                return Err(self.range_error(path, value));
            }
            Ok(v)
        }
    }

    fn range_error(&self, path: &str, value: &Value) -> Error {
        Error::encoding(
            path,
            self.kind(),
            format!("value {} is out of range", value),
        )
    }

    fn type_error(&self, path: &str, value: &Value) -> Error {
        Error::encoding(
            path,
            self.kind(),
            format!("expected an integer, got {}", value.type_name()),
        )
    }
}

impl Transform for IntTransform {
    fn kind(&self) -> String {
        let prefix = if self.signed { "i" } else { "u" };
        format!("{}{} ({})", prefix, self.width.bits(), self.order)
    }

    fn size(&self) -> Size {
        Size::Fixed(self.width.nbytes())
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let raw = self.to_raw(value, &dst.path())?;
        let (buf, n) = self.encode_raw(raw);
        dst.put_slice(&buf[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let raw = src.take(self.width.nbytes())?;
        Ok(self.decode_value(raw))
    }
}

/// Reads an unsigned integer of `raw.len()` bytes in the given order
pub(crate) fn read_uint(raw: &[u8], order: ByteOrder) -> u64 {
    let mut v: u64 = 0;
    match order {
        ByteOrder::Big => {
            for &b in raw {
                v = (v << 8) | u64::from(b);
            }
        }
        ByteOrder::Little => {
            for &b in raw.iter().rev() {
                v = (v << 8) | u64::from(b);
            }
        }
    }
    v
}

/// Writes the low `out.len()` bytes of `v` in the given order
pub(crate) fn write_uint(v: u64, out: &mut [u8], order: ByteOrder) {
    let n = out.len();
    match order {
        ByteOrder::Big => {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = (v >> (8 * (n - 1 - i))) as u8;
            }
        }
        ByteOrder::Little => {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = (v >> (8 * i)) as u8;
            }
        }
    }
}

/// Sign-extends a `bits`-wide two's-complement value to 64 bits
pub(crate) fn sign_extend(v: u64, bits: u32) -> i64 {
    if bits < 64 && (v >> (bits - 1)) & 1 == 1 {
        (v | (u64::MAX << bits)) as i64
    } else {
        v as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{pack, unpack};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_u16_big_endian_pack() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        assert_eq!(&pack(&Value::UInt(0), &t).unwrap()[..], b"\x00\x00");
        assert_eq!(&pack(&Value::UInt(0x1234), &t).unwrap()[..], b"\x12\x34");
    }

    #[test]
    fn test_u16_big_endian_unpack() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        assert_eq!(unpack(&t, b"\x00\x01").unwrap(), Value::UInt(1));
    }

    #[test]
    fn test_little_endian_layout() {
        let t = IntTransform::unsigned(Width::B4, ByteOrder::Little);
        assert_eq!(
            &pack(&Value::UInt(0x0102_0304), &t).unwrap()[..],
            b"\x04\x03\x02\x01"
        );
        assert_eq!(unpack(&t, b"\x04\x03\x02\x01").unwrap(), Value::UInt(0x0102_0304));
    }

    #[test]
    fn test_signed_sign_extension() {
        let t = IntTransform::signed(Width::B1, ByteOrder::Big);
        assert_eq!(unpack(&t, b"\xFF").unwrap(), Value::Int(-1));
        assert_eq!(unpack(&t, b"\x80").unwrap(), Value::Int(-128));
        assert_eq!(&pack(&Value::Int(-2), &t).unwrap()[..], b"\xFE");
    }

    #[test]
    fn test_range_overflow_rejected() {
        let t = IntTransform::unsigned(Width::B1, ByteOrder::Big);
        let err = pack(&Value::UInt(256), &t).unwrap_err();
        assert!(matches!(err.canonical(), Error::Encoding { .. }));

        let t = IntTransform::signed(Width::B1, ByteOrder::Big);
        assert!(pack(&Value::Int(128), &t).is_err());
        assert!(pack(&Value::Int(-129), &t).is_err());
        assert!(pack(&Value::Int(-128), &t).is_ok());
    }

    #[test]
    fn test_negative_rejected_by_unsigned() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        assert!(pack(&Value::Int(-1), &t).is_err());
        assert!(pack(&Value::Int(7), &t).is_ok());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        let err = pack(&Value::Float(1.0), &t).unwrap_err();
        assert!(err.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_insufficient_bytes() {
        let t = IntTransform::unsigned(Width::B4, ByteOrder::Big);
        let err = unpack(&t, b"\x00\x01").unwrap_err();
        assert!(err.is_insufficient());
    }

    #[test]
    fn test_full_width_round_trip() {
        let t = IntTransform::unsigned(Width::B8, ByteOrder::Little);
        let packed = pack(&Value::UInt(u64::MAX), &t).unwrap();
        assert_eq!(unpack(&t, &packed).unwrap(), Value::UInt(u64::MAX));

        let t = IntTransform::signed(Width::B8, ByteOrder::Big);
        let packed = pack(&Value::Int(i64::MIN), &t).unwrap();
        assert_eq!(unpack(&t, &packed).unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn test_sign_extend_helper() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }
}

//! View layer: in-place, zero-copy access to one schema instance inside a
//! caller-owned mutable buffer.
//!
//! A view never caches: reads decode directly from the backing buffer on
//! every access, and writes re-encode in place, touching only the bytes of
//! the addressed field. Only fixed-size schemas may be viewed; the borrow
//! rules of `&mut [u8]` supply the isolation discipline the engine itself
//! does not provide.

use crate::codec;
use crate::error::{Error, Result};
use crate::structure::FieldSlot;
use crate::transform::Transform;
use crate::value::Value;

/// A non-owning window binding one fixed-size schema to a byte range
#[derive(Debug)]
pub struct View<'a> {
    schema: &'a dyn Transform,
    buf: &'a mut [u8],
    offset: usize,
    nbytes: usize,
}

impl<'a> View<'a> {
    /// Binds `schema` to `buf` at `offset`.
    ///
    /// Fails with a size error for variable-length schemas and an
    /// insufficient-memory error when the buffer is too short.
    pub fn new(schema: &'a dyn Transform, buf: &'a mut [u8], offset: usize) -> Result<Self> {
        let nbytes = schema.size().fixed().ok_or_else(|| {
            Error::size(format!("cannot view variable-length schema {}", schema.kind()))
        })?;
        let available = buf.len().saturating_sub(offset);
        if available < nbytes {
            return Err(Error::insufficient("", offset, nbytes, available));
        }
        Ok(Self {
            schema,
            buf,
            offset,
            nbytes,
        })
    }

    /// Byte offset of the view within the backing buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes the view covers
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// The bytes currently backing the view
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.nbytes]
    }

    /// Decodes the whole viewed value from the backing buffer
    pub fn get(&self) -> Result<Value> {
        codec::unpack(self.schema, self.as_bytes())
    }

    /// Re-encodes the whole viewed value into the backing buffer in place
    pub fn set(&mut self, value: &Value) -> Result<()> {
        let bytes = codec::pack(value, self.schema)?;
        if bytes.len() != self.nbytes {
            return Err(Error::implementation(format!(
                "fixed-size transform {} emitted {} byte(s) for a declared size of {}",
                self.schema.kind(),
                bytes.len(),
                self.nbytes
            )));
        }
        self.buf[self.offset..self.offset + self.nbytes].copy_from_slice(&bytes);
        Ok(())
    }

    /// Decodes a single structure member from the backing buffer
    pub fn member(&self, name: &str) -> Result<Value> {
        match self.structure()?.slot(name)? {
            FieldSlot::Whole { offset, transform } => {
                let width = self.member_width(transform.size().fixed(), &transform.kind())?;
                let start = self.offset + offset;
                codec::unpack(transform.as_ref(), &self.buf[start..start + width])
            }
            FieldSlot::Bits { offset, store, range } => {
                let start = self.offset + offset;
                let raw = store.decode_raw(&self.buf[start..start + store.width().nbytes()]);
                Ok(Value::UInt(range.extract(raw)))
            }
        }
    }

    /// Re-encodes a single structure member in place, touching only the
    /// bytes belonging to that member
    pub fn set_member(&mut self, name: &str, value: &Value) -> Result<()> {
        match self.structure()?.slot(name)? {
            FieldSlot::Whole { offset, transform } => {
                let width = self.member_width(transform.size().fixed(), &transform.kind())?;
                let bytes = codec::pack(value, transform.as_ref())?;
                if bytes.len() != width {
                    return Err(Error::implementation(format!(
                        "fixed-size transform {} emitted {} byte(s) for a declared size of {}",
                        transform.kind(),
                        bytes.len(),
                        width
                    )));
                }
                let start = self.offset + offset;
                self.buf[start..start + width].copy_from_slice(&bytes);
                Ok(())
            }
            FieldSlot::Bits { offset, store, range } => {
                let bits = match value {
                    Value::UInt(x) => *x,
                    Value::Int(x) if *x >= 0 => *x as u64,
                    other => {
                        return Err(Error::encoding(
                            format!(".{name}"),
                            range.kind(),
                            format!("expected an unsigned integer, got {}", other.type_name()),
                        ))
                    }
                };
                let start = self.offset + offset;
                let n = store.width().nbytes();
                let raw = store.decode_raw(&self.buf[start..start + n]);
                let raw = range.insert(raw, bits, &format!(".{name}"))?;
                let (buf, n) = store.encode_raw(raw);
                self.buf[start..start + n].copy_from_slice(&buf[..n]);
                Ok(())
            }
        }
    }

    fn structure(&self) -> Result<&crate::structure::Structure> {
        self.schema.as_structure().ok_or_else(|| {
            Error::schema(format!(
                "member access requires a structure schema, not {}",
                self.schema.kind()
            ))
        })
    }

    fn member_width(&self, width: Option<usize>, kind: &str) -> Result<usize> {
        width.ok_or_else(|| {
            Error::implementation(format!(
                "member {} of a fixed structure reports a variable size",
                kind
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureBuilder;
    use crate::transform::{ByteOrder, IntTransform, OptionalTransform, Width};
    use crate::value::Record;
    use pretty_assertions::assert_eq;

    fn header() -> crate::structure::Structure {
        StructureBuilder::new("header", ByteOrder::Big)
            .uint16("kind")
            .bits(Width::B1, &[("fired", 0, 1), ("mode", 1, 2)])
            .uint8("crc")
            .build()
            .unwrap()
    }

    #[test]
    fn test_whole_value_get_set() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        let mut buf = vec![0u8; 4];

        let mut view = View::new(&t, &mut buf, 2).unwrap();
        assert_eq!(view.get().unwrap(), Value::UInt(0));
        view.set(&Value::UInt(0x0102)).unwrap();
        drop(view);

        // only the viewed bytes changed
        assert_eq!(buf, vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_variable_schema_rejected() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        let mut buf = vec![0u8; 4];
        let err = View::new(&t, &mut buf, 0).unwrap_err();
        assert!(matches!(err, Error::Size { .. }));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let t = IntTransform::unsigned(Width::B4, ByteOrder::Big);
        let mut buf = vec![0u8; 5];
        assert!(View::new(&t, &mut buf, 0).is_ok());
        assert!(View::new(&t, &mut buf, 2).unwrap_err().is_insufficient());
    }

    #[test]
    fn test_member_reads_decode_fresh() {
        let schema = header();
        let mut buf = vec![0x00, 0x07, 0x05, 0x99];
        let view = View::new(&schema, &mut buf, 0).unwrap();

        assert_eq!(view.member("kind").unwrap(), Value::UInt(7));
        assert_eq!(view.member("fired").unwrap(), Value::UInt(1));
        assert_eq!(view.member("mode").unwrap(), Value::UInt(2));
        assert_eq!(view.member("crc").unwrap(), Value::UInt(0x99));
    }

    #[test]
    fn test_member_write_touches_only_its_bytes() {
        let schema = header();
        let mut buf = vec![0x00, 0x07, 0x05, 0x99];
        let mut view = View::new(&schema, &mut buf, 0).unwrap();

        view.set_member("kind", &Value::UInt(0x0102)).unwrap();
        assert_eq!(view.as_bytes(), &[0x01, 0x02, 0x05, 0x99]);
    }

    #[test]
    fn test_bit_member_read_modify_write() {
        let schema = header();
        let mut buf = vec![0x00, 0x07, 0b0000_0101, 0x99];
        let mut view = View::new(&schema, &mut buf, 0).unwrap();

        view.set_member("mode", &Value::UInt(3)).unwrap();
        // bit 0 (fired) and the unnamed high bits are untouched
        assert_eq!(view.as_bytes()[2], 0b0000_0111);
        assert_eq!(view.member("fired").unwrap(), Value::UInt(1));

        assert!(view.set_member("mode", &Value::UInt(4)).is_err());
    }

    #[test]
    fn test_whole_record_set() {
        let schema = header();
        let mut buf = vec![0u8; 4];
        let mut view = View::new(&schema, &mut buf, 0).unwrap();

        let v = Value::Record(
            Record::new()
                .with("kind", 1u64)
                .with("fired", 1u64)
                .with("mode", 2u64)
                .with("crc", 0xAAu64),
        );
        view.set(&v).unwrap();
        assert_eq!(view.get().unwrap(), v);
        assert_eq!(view.as_bytes(), &[0x00, 0x01, 0b101, 0xAA]);
    }

    #[test]
    fn test_member_access_requires_structure() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        let mut buf = vec![0u8; 2];
        let view = View::new(&t, &mut buf, 0).unwrap();
        assert!(matches!(
            view.member("kind").unwrap_err(),
            Error::Schema { .. }
        ));
    }

    #[test]
    fn test_view_at_offset_inside_larger_buffer() {
        let schema = header();
        let mut buf = vec![0xEE, 0xEE, 0x00, 0x07, 0x05, 0x99, 0xEE];
        let view = View::new(&schema, &mut buf, 2).unwrap();
        assert_eq!(view.member("kind").unwrap(), Value::UInt(7));
        drop(view);
        assert_eq!(buf[0], 0xEE);
        assert_eq!(buf[6], 0xEE);
    }

    #[test]
    fn test_unknown_member_rejected() {
        let schema = header();
        let mut buf = vec![0u8; 4];
        let view = View::new(&schema, &mut buf, 0).unwrap();
        assert!(view.member("absent").is_err());
    }
}

//! Sequence transforms: raw byte strings and repeated elements.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::transform::{Packer, Size, Transform, Unpacker};
use crate::value::Value;

/// Raw byte string, either exact-length or consuming the rest of the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteLen {
    Fixed(usize),
    Greedy,
}

/// Transform for raw byte strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytesTransform {
    len: ByteLen,
}

impl BytesTransform {
    /// Creates a byte-string transform of exactly `n` bytes
    pub const fn fixed(n: usize) -> Self {
        Self {
            len: ByteLen::Fixed(n),
        }
    }

    /// Creates a byte-string transform consuming the remainder of its window
    pub const fn greedy() -> Self {
        Self {
            len: ByteLen::Greedy,
        }
    }
}

impl Transform for BytesTransform {
    fn kind(&self) -> String {
        match self.len {
            ByteLen::Fixed(n) => format!("bytes[{}]", n),
            ByteLen::Greedy => "bytes".to_string(),
        }
    }

    fn size(&self) -> Size {
        match self.len {
            ByteLen::Fixed(n) => Size::Fixed(n),
            ByteLen::Greedy => Size::Variable,
        }
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let bytes = match value {
            Value::Bytes(b) => b,
            _ => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected bytes, got {}", value.type_name()),
                ))
            }
        };
        if let ByteLen::Fixed(n) = self.len {
            if bytes.len() != n {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected exactly {} byte(s), got {}", n, bytes.len()),
                ));
            }
        }
        dst.put_slice(bytes);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let bytes = match self.len {
            ByteLen::Fixed(n) => src.take(n)?,
            ByteLen::Greedy => src.take(src.remaining())?,
        };
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

/// Element count of a list transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    Greedy,
}

/// Transform repeating one element transform a fixed number of times, or
/// greedily to the end of the window
#[derive(Debug, Clone)]
pub struct ListTransform {
    elem: Arc<dyn Transform>,
    count: Count,
}

impl ListTransform {
    /// Creates a list of exactly `n` elements
    pub fn fixed(elem: impl Transform + 'static, n: usize) -> Self {
        Self {
            elem: Arc::new(elem),
            count: Count::Fixed(n),
        }
    }

    /// Creates a list consuming elements to the end of its window
    pub fn greedy(elem: impl Transform + 'static) -> Self {
        Self {
            elem: Arc::new(elem),
            count: Count::Greedy,
        }
    }

    /// As [`fixed`](ListTransform::fixed), sharing an existing schema node
    pub fn fixed_shared(elem: Arc<dyn Transform>, n: usize) -> Self {
        Self {
            elem,
            count: Count::Fixed(n),
        }
    }

    /// As [`greedy`](ListTransform::greedy), sharing an existing schema node
    pub fn greedy_shared(elem: Arc<dyn Transform>) -> Self {
        Self {
            elem,
            count: Count::Greedy,
        }
    }

    /// The element schema node
    pub fn elem(&self) -> &Arc<dyn Transform> {
        &self.elem
    }
}

impl Transform for ListTransform {
    fn kind(&self) -> String {
        match self.count {
            Count::Fixed(n) => format!("{}[{}]", self.elem.kind(), n),
            Count::Greedy => format!("{}[]", self.elem.kind()),
        }
    }

    fn size(&self) -> Size {
        match self.count {
            Count::Fixed(n) => self.elem.size().times(n),
            Count::Greedy => Size::Variable,
        }
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let items = match value {
            Value::List(items) => items,
            _ => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected a list, got {}", value.type_name()),
                ))
            }
        };
        if let Count::Fixed(n) = self.count {
            if items.len() != n {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected exactly {} element(s), got {}", n, items.len()),
                ));
            }
        }

        for (i, item) in items.iter().enumerate() {
            dst.push_index(i);
            let slot = dst.begin_entry(&self.elem.kind());
            let result = self.elem.pack_into(item, dst);
            dst.end_entry(slot, item);
            dst.pop();
            result?;
        }
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let mut items = Vec::new();
        match self.count {
            Count::Fixed(n) => {
                for i in 0..n {
                    items.push(self.unpack_elem(src, i)?);
                }
            }
            Count::Greedy => {
                while src.remaining() > 0 {
                    let before = src.offset();
                    items.push(self.unpack_elem(src, items.len())?);
                    if src.offset() == before {
                        return Err(Error::implementation(format!(
                            "element transform {} consumed no bytes in a greedy list",
                            self.elem.kind()
                        )));
                    }
                }
            }
        }
        Ok(Value::List(items))
    }
}

impl ListTransform {
    fn unpack_elem(&self, src: &mut Unpacker<'_>, index: usize) -> Result<Value> {
        src.push_index(index);
        let slot = src.begin_entry(&self.elem.kind());
        let result = self.elem.unpack_from(src);
        if let Ok(value) = &result {
            src.end_entry(slot, value);
        }
        src.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{calcsize, pack, unpack};
    use crate::transform::{ByteOrder, IntTransform, Width};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_bytes_round_trip() {
        let t = BytesTransform::fixed(3);
        let packed = pack(&Value::Bytes(vec![1, 2, 3]), &t).unwrap();
        assert_eq!(&packed[..], &[1, 2, 3]);
        assert_eq!(unpack(&t, &packed).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_fixed_bytes_length_enforced() {
        let t = BytesTransform::fixed(3);
        assert!(pack(&Value::Bytes(vec![1, 2]), &t).is_err());
        assert!(unpack(&t, &[1, 2]).unwrap_err().is_insufficient());
        assert!(unpack(&t, &[1, 2, 3, 4]).unwrap_err().is_excess());
    }

    #[test]
    fn test_greedy_bytes_consume_rest() {
        let t = BytesTransform::greedy();
        assert_eq!(
            unpack(&t, &[9, 8, 7]).unwrap(),
            Value::Bytes(vec![9, 8, 7])
        );
        assert_eq!(unpack(&t, &[]).unwrap(), Value::Bytes(vec![]));
    }

    #[test]
    fn test_fixed_list_round_trip() {
        let t = ListTransform::fixed(IntTransform::unsigned(Width::B2, ByteOrder::Big), 2);
        assert_eq!(calcsize(&t).unwrap(), 4);

        let v = Value::List(vec![Value::UInt(1), Value::UInt(2)]);
        let packed = pack(&v, &t).unwrap();
        assert_eq!(&packed[..], b"\x00\x01\x00\x02");
        assert_eq!(unpack(&t, &packed).unwrap(), v);
    }

    #[test]
    fn test_fixed_list_arity_enforced() {
        let t = ListTransform::fixed(IntTransform::unsigned(Width::B1, ByteOrder::Big), 2);
        let err = pack(&Value::List(vec![Value::UInt(1)]), &t).unwrap_err();
        assert!(err.to_string().contains("expected exactly 2 element(s)"));
    }

    #[test]
    fn test_greedy_list_reads_to_end() {
        let t = ListTransform::greedy(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        let v = unpack(&t, b"\x00\x01\x00\x02\x00\x03").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        );
    }

    #[test]
    fn test_greedy_list_partial_element_fails() {
        let t = ListTransform::greedy(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        let err = unpack(&t, b"\x00\x01\x00").unwrap_err();
        assert!(err.is_insufficient());
    }

    #[test]
    fn test_element_error_carries_index_path() {
        let t = ListTransform::fixed(IntTransform::unsigned(Width::B1, ByteOrder::Big), 3);
        let v = Value::List(vec![Value::UInt(1), Value::UInt(300), Value::UInt(2)]);
        let err = pack(&v, &t).unwrap_err();
        assert!(err.to_string().contains("[1]"));
    }
}

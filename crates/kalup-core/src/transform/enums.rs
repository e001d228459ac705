//! Enumerant and flag transforms over integer stores.
//!
//! A plain enum maps a raw integer to exactly one named enumerant and rejects
//! unknown codes on unpack. A flag transform accepts any bit pattern in both
//! directions: named ranges are a reading aid, and bits with no name survive
//! a round trip untouched.

use crate::error::{Error, Result};
use crate::structure::bits::{validate_ranges, BitRange};
use crate::transform::{ByteOrder, IntTransform, Packer, Size, Transform, Unpacker, Width};
use crate::value::Value;

/// Integer-backed transform mapping raw codes to named enumerants
#[derive(Debug, Clone)]
pub struct EnumTransform {
    name: String,
    int: IntTransform,
    members: Vec<(String, u64)>,
}

impl EnumTransform {
    /// Creates an enum transform from `(name, code)` pairs.
    ///
    /// Fails if a name or code repeats, or a code does not fit the width.
    pub fn new(
        name: impl Into<String>,
        width: Width,
        order: ByteOrder,
        members: &[(&str, u64)],
    ) -> Result<Self> {
        let name = name.into();
        let int = IntTransform::unsigned(width, order);

        if members.is_empty() {
            return Err(Error::schema(format!("enum `{}` has no members", name)));
        }
        for (i, (member, code)) in members.iter().enumerate() {
            if member.is_empty() {
                return Err(Error::schema(format!("enum `{}` has an unnamed member", name)));
            }
            if *code > int.max_unsigned() {
                return Err(Error::schema(format!(
                    "enum `{}` member `{}` code {} does not fit {} bit(s)",
                    name,
                    member,
                    code,
                    width.bits()
                )));
            }
            for (other, other_code) in &members[..i] {
                if other == member {
                    return Err(Error::schema(format!(
                        "enum `{}` has duplicate member `{}`",
                        name, member
                    )));
                }
                if other_code == code {
                    return Err(Error::schema(format!(
                        "enum `{}` members `{}` and `{}` share code {}",
                        name, other, member, code
                    )));
                }
            }
        }

        Ok(Self {
            name,
            int,
            members: members
                .iter()
                .map(|(n, c)| (n.to_string(), *c))
                .collect(),
        })
    }

    /// Looks up the code of an enumerant name
    pub fn code_of(&self, member: &str) -> Option<u64> {
        self.members
            .iter()
            .find(|(n, _)| n == member)
            .map(|(_, c)| *c)
    }

    /// Looks up the enumerant name of a code
    pub fn name_of(&self, code: u64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(n, _)| n.as_str())
    }
}

impl Transform for EnumTransform {
    fn kind(&self) -> String {
        format!(
            "enum {} (u{}, {})",
            self.name,
            self.int.width().bits(),
            self.int.order()
        )
    }

    fn size(&self) -> Size {
        self.int.size()
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let code = match value {
            Value::Keyword(member) => self.code_of(member).ok_or_else(|| {
                Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("unknown enumerant `{}`", member),
                )
            })?,
            Value::UInt(code) if self.name_of(*code).is_some() => *code,
            Value::Int(code)
                if *code >= 0 && self.name_of(*code as u64).is_some() =>
            {
                *code as u64
            }
            Value::UInt(code) => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("no enumerant has code {}", code),
                ))
            }
            Value::Int(code) => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("no enumerant has code {}", code),
                ))
            }
            _ => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected a keyword, got {}", value.type_name()),
                ))
            }
        };

        let (buf, n) = self.int.encode_raw(code);
        dst.put_slice(&buf[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let offset = src.offset();
        let raw = self.int.decode_raw(src.take(self.int.width().nbytes())?);
        match self.name_of(raw) {
            Some(member) => Ok(Value::Keyword(member.to_string())),
            None => Err(Error::decoding(
                src.path(),
                self.kind(),
                offset,
                format!("unknown enumerant code {}", raw),
            )),
        }
    }
}

/// Integer-backed transform whose named bit ranges describe, but never
/// restrict, the legal bit patterns
#[derive(Debug, Clone)]
pub struct FlagTransform {
    name: String,
    int: IntTransform,
    fields: Vec<BitRange>,
}

impl FlagTransform {
    /// Creates a flag transform from `(name, bit-offset, bit-width)` ranges.
    ///
    /// Single-bit flags and wider sub-fields are declared alike; ranges must
    /// be disjoint and fit the store width.
    pub fn new(
        name: impl Into<String>,
        width: Width,
        order: ByteOrder,
        fields: &[(&str, u32, u32)],
    ) -> Result<Self> {
        let fields: Vec<BitRange> = fields
            .iter()
            .map(|(n, offset, bits)| BitRange::new(*n, *offset, *bits))
            .collect();
        validate_ranges(&fields, width.bits())?;
        Ok(Self {
            name: name.into(),
            int: IntTransform::unsigned(width, order),
            fields,
        })
    }

    /// Builds raw bits from named field values; unnamed bits stay zero
    pub fn compose(&self, fields: &[(&str, u64)]) -> Result<u64> {
        let mut raw = 0u64;
        for (name, value) in fields {
            let range = self.range_of(name)?;
            raw = range.insert(raw, *value, &format!(".{name}"))?;
        }
        Ok(raw)
    }

    /// Reads every named field out of raw bits, in declaration order
    pub fn decompose(&self, raw: u64) -> Vec<(String, u64)> {
        self.fields
            .iter()
            .map(|range| (range.name.clone(), range.extract(raw)))
            .collect()
    }

    /// Reads one named field out of raw bits
    pub fn get(&self, raw: u64, name: &str) -> Result<u64> {
        Ok(self.range_of(name)?.extract(raw))
    }

    /// Writes one named field into raw bits, returning the new bits
    pub fn set(&self, raw: u64, name: &str, value: u64) -> Result<u64> {
        self.range_of(name)?.insert(raw, value, &format!(".{name}"))
    }

    fn range_of(&self, name: &str) -> Result<&BitRange> {
        self.fields
            .iter()
            .find(|range| range.name == name)
            .ok_or_else(|| {
                Error::schema(format!(
                    "flags `{}` declare no field named `{}`",
                    self.name, name
                ))
            })
    }
}

impl Transform for FlagTransform {
    fn kind(&self) -> String {
        format!(
            "flags {} (u{}, {})",
            self.name,
            self.int.width().bits(),
            self.int.order()
        )
    }

    fn size(&self) -> Size {
        self.int.size()
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let raw = match value {
            Value::Flags(raw) => *raw,
            Value::UInt(raw) => *raw,
            _ => {
                return Err(Error::encoding(
                    dst.path(),
                    self.kind(),
                    format!("expected flag bits, got {}", value.type_name()),
                ))
            }
        };
        if raw > self.int.max_unsigned() {
            return Err(Error::encoding(
                dst.path(),
                self.kind(),
                format!("bits {:#x} do not fit {} bit(s)", raw, self.int.width().bits()),
            ));
        }

        let (buf, n) = self.int.encode_raw(raw);
        dst.put_slice(&buf[..n]);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let raw = self.int.decode_raw(src.take(self.int.width().nbytes())?);
        Ok(Value::Flags(raw))
    }
}

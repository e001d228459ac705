//! Structure engine: ordered, named members composed into one record schema.
//!
//! A [`Structure`] is built once, at definition time, through a
//! [`StructureBuilder`]: an explicit, immutable value holding an ordered list
//! of members, each with its own transform. The generic pack/unpack walk is
//! implemented once over that member list; nothing is generated per type.
//!
//! ## Member forms
//!
//! - **Plain**: a named transform of fixed or variable length.
//! - **Sized**: length in bytes is the decoded value of an earlier integer
//!   member; the content is decoded inside an exact-length window.
//! - **Counted**: element count is the decoded value of an earlier integer
//!   member.
//! - **Bit-field group**: several named bit ranges sharing one fixed-width
//!   unsigned store; range values appear as flat members of the record.
//!
//! ## Sized members on pack
//!
//! The engine recomputes size-source members while packing: the source's
//! bytes are reserved when the walk reaches them and patched with the
//! measured length (or element count) once the dependent member has been
//! packed. A caller-supplied source value is accepted, so unpacked records
//! round-trip verbatim, but the recomputed value always wins.

pub(crate) mod bits;

use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::structure::bits::{validate_ranges, BitRange};
use crate::transform::{
    BytesTransform, ByteOrder, DecimalTransform, EnumTransform, FlagTransform, FloatTransform,
    FloatWidth, IntTransform, IpTransform, ListTransform, OptionalTransform, Packer, RationalTransform,
    Size, Transform, Unpacker, Width,
};
use crate::value::{Record, Value};

/// Stand-in for members the arity check has already proven present
static NOTHING: Value = Value::Nothing;

/// How a named field member obtains its length
#[derive(Debug, Clone)]
enum FieldKind {
    /// The transform's own declared length
    Plain,
    /// Byte length read from the member at `source`
    SizedBytes { source: usize },
    /// Element count read from the member at `source`
    Counted { source: usize },
}

/// One resolved member of a structure
#[derive(Debug, Clone)]
enum Member {
    /// A named field; for counted fields the transform is the element
    Field {
        name: String,
        transform: Arc<dyn Transform>,
        kind: FieldKind,
        source_int: Option<IntTransform>,
        feeds: Option<usize>,
    },
    /// Named bit ranges sharing one unsigned store window
    Bits {
        store: IntTransform,
        fields: Vec<BitRange>,
    },
}

impl Member {
    fn size(&self) -> Size {
        match self {
            Member::Field { kind: FieldKind::Plain, transform, .. } => transform.size(),
            Member::Field { .. } => Size::Variable,
            Member::Bits { store, .. } => store.size(),
        }
    }
}

/// A fixed or variable-length composite record schema.
///
/// Structures are immutable after [`build`](StructureBuilder::build) and are
/// themselves transforms, so they nest as members of other structures.
#[derive(Debug, Clone)]
pub struct Structure {
    name: String,
    order: ByteOrder,
    members: Vec<Member>,
    value_names: Vec<String>,
    size: Size,
    offsets: Option<Vec<usize>>,
}

impl Structure {
    /// The structure's schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte order every primitive member was selected with
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Names of the record members, in declaration order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.value_names.iter().map(String::as_str)
    }

    /// Resolves the decoded length or count of a size source
    fn source_value(&self, record: &Record, source: usize) -> Result<usize> {
        let Member::Field { name, .. } = &self.members[source] else {
            return Err(Error::implementation(
                "size source resolved to a bit-field member",
            ));
        };
        record
            .get(name)
            .and_then(Value::as_len)
            .ok_or_else(|| {
                Error::implementation(format!(
                    "size member `{}` was not decoded before its dependent",
                    name
                ))
            })
    }

    /// Checks a record against the member list before packing
    fn check_arity(&self, record: &Record, path: &str) -> Result<()> {
        for name in record.names() {
            if !self.value_names.iter().any(|n| n == name) {
                return Err(Error::encoding(
                    path,
                    self.kind(),
                    format!("unexpected member `{}`", name),
                ));
            }
        }
        for member in &self.members {
            match member {
                Member::Field { name, feeds, .. } => {
                    // size sources are recomputed, so they may be omitted
                    if feeds.is_none() && !record.contains(name) {
                        return Err(Error::encoding(
                            path,
                            self.kind(),
                            format!("missing member `{}`", name),
                        ));
                    }
                }
                Member::Bits { fields, .. } => {
                    for range in fields {
                        if !record.contains(&range.name) {
                            return Err(Error::encoding(
                                path,
                                self.kind(),
                                format!("missing member `{}`", range.name),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Patches a reserved size-source slot with the measured value
    fn patch_source(
        &self,
        dst: &mut Packer,
        source: usize,
        reserved: &[Option<(usize, Option<usize>)>],
        value: u64,
    ) -> Result<()> {
        let Member::Field { name, source_int: Some(int), .. } = &self.members[source] else {
            return Err(Error::implementation(
                "size source is not an integer member",
            ));
        };
        let Some((offset, slot)) = reserved[source] else {
            return Err(Error::implementation(format!(
                "size member `{}` was not packed before its dependent",
                name
            )));
        };
        if value > int.max_unsigned() {
            dst.push_field(name);
            let err = Error::encoding(
                dst.path(),
                int.kind(),
                format!("measured length {} does not fit the size member", value),
            );
            dst.pop();
            return Err(err);
        }
        let (buf, n) = int.encode_raw(value);
        dst.patch(offset, &buf[..n]);
        dst.end_entry_span(slot, &Value::UInt(value), offset + n);
        Ok(())
    }

    fn pack_field(
        &self,
        dst: &mut Packer,
        name: &str,
        transform: &Arc<dyn Transform>,
        value: &Value,
    ) -> Result<()> {
        dst.push_field(name);
        let slot = dst.begin_entry(&transform.kind());
        let result = transform.pack_into(value, dst);
        if result.is_ok() {
            dst.end_entry(slot, value);
        }
        dst.pop();
        result
    }

    fn unpack_field(
        &self,
        src: &mut Unpacker<'_>,
        name: &str,
        transform: &Arc<dyn Transform>,
    ) -> Result<Value> {
        src.push_field(name);
        let slot = src.begin_entry(&transform.kind());
        let result = transform.unpack_from(src);
        if let Ok(value) = &result {
            src.end_entry(slot, value);
        }
        src.pop();
        result
    }

    /// Locates a member's byte range for in-place access; fixed schemas only
    pub(crate) fn slot(&self, name: &str) -> Result<FieldSlot> {
        let offsets = self.offsets.as_ref().ok_or_else(|| {
            Error::size(format!(
                "structure `{}` is variable and has no member offsets",
                self.name
            ))
        })?;

        for (idx, member) in self.members.iter().enumerate() {
            match member {
                Member::Field { name: n, transform, .. } if n == name => {
                    return Ok(FieldSlot::Whole {
                        offset: offsets[idx],
                        transform: transform.clone(),
                    });
                }
                Member::Bits { store, fields } => {
                    if let Some(range) = fields.iter().find(|r| r.name == name) {
                        return Ok(FieldSlot::Bits {
                            offset: offsets[idx],
                            store: *store,
                            range: range.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        Err(Error::schema(format!(
            "structure `{}` has no member `{}`",
            self.name, name
        )))
    }
}

/// Location of one member inside a fixed-size structure instance
#[derive(Debug, Clone)]
pub(crate) enum FieldSlot {
    /// A whole member occupying its own byte range
    Whole {
        offset: usize,
        transform: Arc<dyn Transform>,
    },
    /// A bit range within a shared store window
    Bits {
        offset: usize,
        store: IntTransform,
        range: BitRange,
    },
}

impl Transform for Structure {
    fn kind(&self) -> String {
        format!("struct {} ({})", self.name, self.order)
    }

    fn size(&self) -> Size {
        self.size
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let record = value.as_record().ok_or_else(|| {
            Error::encoding(
                dst.path(),
                self.kind(),
                format!("expected a record, got {}", value.type_name()),
            )
        })?;
        self.check_arity(record, &dst.path())?;

        let mut reserved: Vec<Option<(usize, Option<usize>)>> = vec![None; self.members.len()];

        for (idx, member) in self.members.iter().enumerate() {
            match member {
                Member::Field { name, transform, kind, source_int, feeds } => match kind {
                    FieldKind::Plain => {
                        if feeds.is_some() {
                            // reserve the source bytes; patched after the
                            // dependent member is packed
                            let int = source_int.ok_or_else(|| {
                                Error::implementation("size source lost its integer transform")
                            })?;
                            dst.push_field(name);
                            let slot = dst.begin_entry(&transform.kind());
                            let offset = dst.offset();
                            let (buf, n) = int.encode_raw(0);
                            dst.put_slice(&buf[..n]);
                            dst.pop();
                            reserved[idx] = Some((offset, slot));
                        } else {
                            // presence guaranteed by the arity check
                            let v = record.get(name).unwrap_or(&NOTHING);
                            self.pack_field(dst, name, transform, v)?;
                        }
                    }
                    FieldKind::SizedBytes { source } => {
                        let v = record.get(name).unwrap_or(&NOTHING);
                        let start = dst.offset();
                        self.pack_field(dst, name, transform, v)?;
                        let len = dst.offset() - start;
                        self.patch_source(dst, *source, &reserved, len as u64)?;
                    }
                    FieldKind::Counted { source } => {
                        let v = record.get(name).unwrap_or(&NOTHING);
                        let items = v.as_list().ok_or_else(|| {
                            Error::encoding(
                                dst.path(),
                                self.kind(),
                                format!("member `{}` expected a list, got {}", name, v.type_name()),
                            )
                        })?;
                        dst.push_field(name);
                        for (i, item) in items.iter().enumerate() {
                            dst.push_index(i);
                            let slot = dst.begin_entry(&transform.kind());
                            let result = transform.pack_into(item, dst);
                            if result.is_ok() {
                                dst.end_entry(slot, item);
                            }
                            dst.pop();
                            if let Err(err) = result {
                                dst.pop();
                                return Err(err);
                            }
                        }
                        dst.pop();
                        self.patch_source(dst, *source, &reserved, items.len() as u64)?;
                    }
                },
                Member::Bits { store, fields } => {
                    let mut raw = 0u64;
                    for range in fields {
                        dst.push_field(&range.name);
                        let v = record.get(&range.name).unwrap_or(&NOTHING);
                        let bits = match v {
                            Value::UInt(x) => Ok(*x),
                            Value::Int(x) if *x >= 0 => Ok(*x as u64),
                            other => Err(Error::encoding(
                                dst.path(),
                                range.kind(),
                                format!("expected an unsigned integer, got {}", other.type_name()),
                            )),
                        };
                        let insert = bits.and_then(|b| range.insert(raw, b, &dst.path()));
                        dst.pop();
                        raw = insert?;
                    }

                    let offset = dst.offset();
                    let (buf, n) = store.encode_raw(raw);
                    dst.put_slice(&buf[..n]);
                    for range in fields {
                        dst.push_field(&range.name);
                        dst.note_entry(&range.kind(), offset, n, &Value::UInt(range.extract(raw)));
                        dst.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let mut record = Record::new();

        for member in &self.members {
            match member {
                Member::Field { name, transform, kind, .. } => match kind {
                    FieldKind::Plain => {
                        let v = self.unpack_field(src, name, transform)?;
                        trace!(member = %name, offset = src.offset(), "decoded member");
                        record.set(name.clone(), v);
                    }
                    FieldKind::SizedBytes { source } => {
                        let len = self.source_value(&record, *source)?;
                        src.push_field(name);
                        let window = src.open_window(len)?;
                        let slot = src.begin_entry(&transform.kind());
                        let result = transform.unpack_from(src);
                        if let Ok(value) = &result {
                            src.end_entry(slot, value);
                        }
                        let v = match result {
                            Ok(v) => v,
                            Err(err) => {
                                src.pop();
                                return Err(err);
                            }
                        };
                        let closed = src.close_window(window);
                        src.pop();
                        closed?;
                        record.set(name.clone(), v);
                    }
                    FieldKind::Counted { source } => {
                        let count = self.source_value(&record, *source)?;
                        src.push_field(name);
                        let mut items = Vec::with_capacity(count);
                        for i in 0..count {
                            src.push_index(i);
                            let slot = src.begin_entry(&transform.kind());
                            let result = transform.unpack_from(src);
                            if let Ok(value) = &result {
                                src.end_entry(slot, value);
                            }
                            src.pop();
                            match result {
                                Ok(v) => items.push(v),
                                Err(err) => {
                                    src.pop();
                                    return Err(err);
                                }
                            }
                        }
                        src.pop();
                        record.set(name.clone(), Value::List(items));
                    }
                },
                Member::Bits { store, fields } => {
                    let offset = src.offset();
                    let raw = store.decode_raw(src.take(store.width().nbytes())?);
                    for range in fields {
                        let v = Value::UInt(range.extract(raw));
                        src.push_field(&range.name);
                        src.note_entry(&range.kind(), offset, store.width().nbytes(), &v);
                        src.pop();
                        record.set(range.name.clone(), v);
                    }
                }
            }
        }

        Ok(Value::Record(record))
    }

    fn as_structure(&self) -> Option<&Structure> {
        Some(self)
    }
}

/// One pending declaration inside a [`StructureBuilder`]
enum Decl {
    Plain {
        name: String,
        transform: Arc<dyn Transform>,
        source_int: Option<IntTransform>,
    },
    SizedBytes {
        name: String,
        transform: Arc<dyn Transform>,
        by: String,
    },
    Counted {
        name: String,
        elem: Arc<dyn Transform>,
        by: String,
    },
    Bits {
        store: IntTransform,
        fields: Vec<(String, u32, u32)>,
    },
}

/// Builder assembling a [`Structure`] from ordered member declarations.
///
/// The byte order chosen at construction selects the variant of every
/// primitive the convenience methods create; big- and little-endian layouts
/// of the same record are two builder invocations.
pub struct StructureBuilder {
    name: String,
    order: ByteOrder,
    decls: Vec<Decl>,
    error: Option<Error>,
}

impl StructureBuilder {
    /// Starts a structure schema with the given name and byte order
    pub fn new(name: impl Into<String>, order: ByteOrder) -> Self {
        Self {
            name: name.into(),
            order,
            decls: Vec::new(),
            error: None,
        }
    }

    fn push_plain(
        &mut self,
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        source_int: Option<IntTransform>,
    ) {
        self.decls.push(Decl::Plain {
            name: name.into(),
            transform,
            source_int,
        });
    }

    fn push_int(mut self, name: impl Into<String>, width: Width, signed: bool) -> Self {
        let int = IntTransform::new(width, self.order, signed);
        self.push_plain(name, Arc::new(int), Some(int));
        self
    }

    fn latch(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Adds an unsigned 1-byte integer member
    pub fn uint8(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B1, false)
    }

    /// Adds an unsigned 2-byte integer member
    pub fn uint16(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B2, false)
    }

    /// Adds an unsigned 4-byte integer member
    pub fn uint32(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B4, false)
    }

    /// Adds an unsigned 8-byte integer member
    pub fn uint64(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B8, false)
    }

    /// Adds a signed 1-byte integer member
    pub fn int8(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B1, true)
    }

    /// Adds a signed 2-byte integer member
    pub fn int16(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B2, true)
    }

    /// Adds a signed 4-byte integer member
    pub fn int32(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B4, true)
    }

    /// Adds a signed 8-byte integer member
    pub fn int64(self, name: impl Into<String>) -> Self {
        self.push_int(name, Width::B8, true)
    }

    /// Adds a half-precision float member
    pub fn float16(mut self, name: impl Into<String>) -> Self {
        let t = FloatTransform::new(FloatWidth::Half, self.order);
        self.push_plain(name, Arc::new(t), None);
        self
    }

    /// Adds a single-precision float member
    pub fn float32(mut self, name: impl Into<String>) -> Self {
        let t = FloatTransform::new(FloatWidth::Single, self.order);
        self.push_plain(name, Arc::new(t), None);
        self
    }

    /// Adds a double-precision float member
    pub fn float64(mut self, name: impl Into<String>) -> Self {
        let t = FloatTransform::new(FloatWidth::Double, self.order);
        self.push_plain(name, Arc::new(t), None);
        self
    }

    /// Adds a fixed-point decimal member
    pub fn decimal(
        mut self,
        name: impl Into<String>,
        width: Width,
        signed: bool,
        precision: u32,
    ) -> Self {
        match DecimalTransform::new(width, self.order, signed, precision) {
            Ok(t) => self.push_plain(name, Arc::new(t), None),
            Err(err) => self.latch(err),
        }
        self
    }

    /// Adds a rational member (two 4-byte integers)
    pub fn rational(mut self, name: impl Into<String>, signed: bool) -> Self {
        let t = RationalTransform::new(self.order, signed);
        self.push_plain(name, Arc::new(t), None);
        self
    }

    /// Adds an enum member from `(name, code)` pairs
    pub fn enumeration(
        mut self,
        name: impl Into<String>,
        width: Width,
        members: &[(&str, u64)],
    ) -> Self {
        let name = name.into();
        match EnumTransform::new(name.clone(), width, self.order, members) {
            Ok(t) => self.push_plain(name, Arc::new(t), None),
            Err(err) => self.latch(err),
        }
        self
    }

    /// Adds a flag member from `(name, bit-offset, bit-width)` ranges
    pub fn flags(
        mut self,
        name: impl Into<String>,
        width: Width,
        fields: &[(&str, u32, u32)],
    ) -> Self {
        let name = name.into();
        match FlagTransform::new(name.clone(), width, self.order, fields) {
            Ok(t) => self.push_plain(name, Arc::new(t), None),
            Err(err) => self.latch(err),
        }
        self
    }

    /// Adds an exact-length byte-string member
    pub fn bytes(mut self, name: impl Into<String>, len: usize) -> Self {
        self.push_plain(name, Arc::new(BytesTransform::fixed(len)), None);
        self
    }

    /// Adds an IPv4 address member
    pub fn ipv4(mut self, name: impl Into<String>) -> Self {
        self.push_plain(name, Arc::new(IpTransform::v4()), None);
        self
    }

    /// Adds an IPv6 address member
    pub fn ipv6(mut self, name: impl Into<String>) -> Self {
        self.push_plain(name, Arc::new(IpTransform::v6()), None);
        self
    }

    /// Adds a fixed-count array member
    pub fn array(
        mut self,
        name: impl Into<String>,
        elem: impl Transform + 'static,
        count: usize,
    ) -> Self {
        self.push_plain(name, Arc::new(ListTransform::fixed(elem, count)), None);
        self
    }

    /// Adds an optional tail member; legal only in final position
    pub fn optional(mut self, name: impl Into<String>, inner: impl Transform + 'static) -> Self {
        self.push_plain(name, Arc::new(OptionalTransform::new(inner)), None);
        self
    }

    /// Adds a member with an arbitrary transform
    pub fn member(mut self, name: impl Into<String>, transform: impl Transform + 'static) -> Self {
        self.push_plain(name, Arc::new(transform), None);
        self
    }

    /// Adds a member sharing an existing schema node
    pub fn member_shared(mut self, name: impl Into<String>, transform: Arc<dyn Transform>) -> Self {
        self.push_plain(name, transform, None);
        self
    }

    /// Adds a bit-field group: named ranges over one unsigned store window
    pub fn bits(mut self, width: Width, fields: &[(&str, u32, u32)]) -> Self {
        self.decls.push(Decl::Bits {
            store: IntTransform::unsigned(width, self.order),
            fields: fields
                .iter()
                .map(|(n, offset, bits)| (n.to_string(), *offset, *bits))
                .collect(),
        });
        self
    }

    /// Adds a byte-string member whose length is the value of the earlier
    /// integer member named `by`
    pub fn sized_bytes(mut self, name: impl Into<String>, by: impl Into<String>) -> Self {
        self.decls.push(Decl::SizedBytes {
            name: name.into(),
            transform: Arc::new(BytesTransform::greedy()),
            by: by.into(),
        });
        self
    }

    /// Adds a member whose window length is the value of the earlier integer
    /// member named `by`, decoded with an arbitrary transform
    pub fn sized(
        mut self,
        name: impl Into<String>,
        transform: impl Transform + 'static,
        by: impl Into<String>,
    ) -> Self {
        self.decls.push(Decl::SizedBytes {
            name: name.into(),
            transform: Arc::new(transform),
            by: by.into(),
        });
        self
    }

    /// Adds a list member whose element count is the value of the earlier
    /// integer member named `by`
    pub fn counted(
        mut self,
        name: impl Into<String>,
        elem: impl Transform + 'static,
        by: impl Into<String>,
    ) -> Self {
        self.decls.push(Decl::Counted {
            name: name.into(),
            elem: Arc::new(elem),
            by: by.into(),
        });
        self
    }

    /// Resolves and validates the declarations into an immutable structure
    pub fn build(self) -> Result<Structure> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.name.is_empty() {
            return Err(Error::schema("structure has an empty name"));
        }

        // value-level names must be unique and non-empty
        let mut value_names: Vec<String> = Vec::new();
        for decl in &self.decls {
            let names: Vec<&str> = match decl {
                Decl::Plain { name, .. }
                | Decl::SizedBytes { name, .. }
                | Decl::Counted { name, .. } => vec![name.as_str()],
                Decl::Bits { fields, .. } => fields.iter().map(|(n, _, _)| n.as_str()).collect(),
            };
            for name in names {
                if name.is_empty() {
                    return Err(Error::schema(format!(
                        "structure `{}` has an unnamed member",
                        self.name
                    )));
                }
                if value_names.iter().any(|n| n == name) {
                    return Err(Error::schema(format!(
                        "structure `{}` has duplicate member `{}`",
                        self.name, name
                    )));
                }
                value_names.push(name.to_string());
            }
        }

        let mut members: Vec<Member> = Vec::with_capacity(self.decls.len());
        for decl in self.decls {
            let idx = members.len();
            match decl {
                Decl::Plain { name, transform, source_int } => {
                    members.push(Member::Field {
                        name,
                        transform,
                        kind: FieldKind::Plain,
                        source_int,
                        feeds: None,
                    });
                }
                Decl::SizedBytes { name, transform, by } => {
                    let source = resolve_source(&self.name, &mut members, &name, &by, idx)?;
                    members.push(Member::Field {
                        name,
                        transform,
                        kind: FieldKind::SizedBytes { source },
                        source_int: None,
                        feeds: None,
                    });
                }
                Decl::Counted { name, elem, by } => {
                    let source = resolve_source(&self.name, &mut members, &name, &by, idx)?;
                    members.push(Member::Field {
                        name,
                        transform: elem,
                        kind: FieldKind::Counted { source },
                        source_int: None,
                        feeds: None,
                    });
                }
                Decl::Bits { store, fields } => {
                    let ranges: Vec<BitRange> = fields
                        .into_iter()
                        .map(|(n, offset, bits)| BitRange::new(n, offset, bits))
                        .collect();
                    validate_ranges(&ranges, store.width().bits())?;
                    members.push(Member::Bits {
                        store,
                        fields: ranges,
                    });
                }
            }
        }

        // variable members that are not sized windows must come last
        for (i, member) in members.iter().enumerate() {
            let is_last = i + 1 == members.len();
            if let Member::Field { name, kind: FieldKind::Plain, transform, .. } = member {
                if transform.size().is_variable() && !is_last {
                    return Err(Error::schema(format!(
                        "structure `{}`: variable-length member `{}` must be the final member",
                        self.name, name
                    )));
                }
            }
        }

        let size = members
            .iter()
            .fold(Size::Fixed(0), |acc, m| acc.add(m.size()));

        let offsets = size.fixed().map(|_| {
            let mut offsets = Vec::with_capacity(members.len());
            let mut offset = 0;
            for member in &members {
                offsets.push(offset);
                // every member is fixed when the whole structure is
                offset += member.size().fixed().unwrap_or(0);
            }
            offsets
        });

        Ok(Structure {
            name: self.name,
            order: self.order,
            members,
            value_names,
            size,
            offsets,
        })
    }
}

/// Resolves a `by` reference to an earlier integer member and marks that
/// member as the dependent's size source
fn resolve_source(
    structure: &str,
    members: &mut [Member],
    dependent: &str,
    by: &str,
    dependent_idx: usize,
) -> Result<usize> {
    let source = members
        .iter()
        .position(|m| matches!(m, Member::Field { name, .. } if name == by))
        .ok_or_else(|| {
            Error::schema(format!(
                "structure `{}`: size member `{}` is not declared before `{}`",
                structure, by, dependent
            ))
        })?;

    if let Member::Field { kind, source_int, feeds, .. } = &mut members[source] {
        if !matches!(kind, FieldKind::Plain) || source_int.is_none() {
            return Err(Error::schema(format!(
                "structure `{}`: size member `{}` must be a fixed-width integer",
                structure, by
            )));
        }
        if feeds.is_some() {
            return Err(Error::schema(format!(
                "structure `{}`: size member `{}` already feeds another member",
                structure, by
            )));
        }
        *feeds = Some(dependent_idx);
    }
    Ok(source)
}

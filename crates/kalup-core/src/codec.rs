//! Top-level pack/unpack operations.
//!
//! The plain [`pack`]/[`unpack`] entry points run without diagnostics; when a
//! call fails, the same operation is re-executed once with diagnostics
//! enabled, purely to attach a rendered dump to the error. The two passes
//! must be equivalent: a re-pass that succeeds or fails differently is
//! reported as an implementation defect instead of the original failure.
//! [`pack_and_dump`]/[`unpack_and_dump`] run a single diagnostic pass and
//! hand the dump back on success.

use bytes::Bytes;
use tracing::debug;

use crate::dump::Dump;
use crate::error::{Error, Result};
use crate::transform::{Packer, Transform, Unpacker};
use crate::value::Value;
use crate::view::View;

/// Encodes `value` with `schema`, returning the packed bytes
pub fn pack(value: &Value, schema: &dyn Transform) -> Result<Bytes> {
    debug!(schema = %schema.kind(), "packing value");
    let mut dst = Packer::new(false);
    match run_pack(value, schema, &mut dst) {
        Ok(()) => {
            let (bytes, _) = dst.finish();
            Ok(bytes)
        }
        Err(first) => {
            debug!(error = %first, "pack failed; re-running with diagnostics");
            let mut probe = Packer::new(true);
            let second = run_pack(value, schema, &mut probe);
            Err(resolve_repass(first, second.err(), probe.take_dump()))
        }
    }
}

/// As [`pack`], also returning the diagnostic dump of the walk
pub fn pack_and_dump(value: &Value, schema: &dyn Transform) -> Result<(Bytes, Dump)> {
    let mut dst = Packer::new(true);
    match run_pack(value, schema, &mut dst) {
        Ok(()) => {
            let (bytes, dump) = dst.finish();
            let dump = dump
                .ok_or_else(|| Error::implementation("diagnostic pass produced no dump"))?;
            Ok((bytes, dump))
        }
        Err(err) => Err(attach_dump(err, dst.take_dump())),
    }
}

/// Decodes one value of `schema` from `buffer`, which must be consumed
/// exactly: trailing bytes are an excess-memory error, never dropped
pub fn unpack(schema: &dyn Transform, buffer: &[u8]) -> Result<Value> {
    debug!(schema = %schema.kind(), nbytes = buffer.len(), "unpacking buffer");
    let mut src = Unpacker::new(buffer, false);
    match run_unpack(schema, &mut src) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!(error = %first, "unpack failed; re-running with diagnostics");
            let mut probe = Unpacker::new(buffer, true);
            let second = run_unpack(schema, &mut probe);
            Err(resolve_repass(first, second.err(), probe.take_dump()))
        }
    }
}

/// As [`unpack`], also returning the diagnostic dump of the walk
pub fn unpack_and_dump(schema: &dyn Transform, buffer: &[u8]) -> Result<(Value, Dump)> {
    let mut src = Unpacker::new(buffer, true);
    match run_unpack(schema, &mut src) {
        Ok(value) => {
            let dump = src
                .take_dump()
                .ok_or_else(|| Error::implementation("diagnostic pass produced no dump"))?;
            Ok((value, dump))
        }
        Err(err) => Err(attach_dump(err, src.take_dump())),
    }
}

/// Returns the fixed byte size of a schema, or a size error
pub fn calcsize(schema: &dyn Transform) -> Result<usize> {
    schema
        .size()
        .fixed()
        .ok_or_else(|| Error::size(format!("{} has no fixed size", schema.kind())))
}

/// Binds a fixed-size schema to `buffer` at `offset` for in-place access
pub fn view<'a>(
    schema: &'a dyn Transform,
    buffer: &'a mut [u8],
    offset: usize,
) -> Result<View<'a>> {
    View::new(schema, buffer, offset)
}

fn run_pack(value: &Value, schema: &dyn Transform, dst: &mut Packer) -> Result<()> {
    let slot = dst.begin_entry(&schema.kind());
    schema.pack_into(value, dst)?;
    dst.end_entry(slot, value);
    Ok(())
}

fn run_unpack(schema: &dyn Transform, src: &mut Unpacker<'_>) -> Result<Value> {
    let slot = src.begin_entry(&schema.kind());
    let value = schema.unpack_from(src)?;
    src.end_entry(slot, &value);
    src.expect_consumed()?;
    Ok(value)
}

/// Reconciles the diagnostic re-pass with the original failure
fn resolve_repass(first: Error, second: Option<Error>, dump: Option<Dump>) -> Error {
    match second {
        None => Error::implementation(format!(
            "failure did not reproduce when re-run with diagnostics: {}",
            first
        )),
        Some(second) if !same_failure(&first, &second) => Error::implementation(format!(
            "diagnostic re-pass failed differently: `{}` then `{}`",
            first, second
        )),
        Some(second) => attach_dump(second, dump),
    }
}

fn attach_dump(err: Error, dump: Option<Dump>) -> Error {
    match dump {
        Some(dump) => Error::with_dump(err, dump.render()),
        None => err,
    }
}

fn same_failure(a: &Error, b: &Error) -> bool {
    a.canonical().to_string() == b.canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureBuilder;
    use crate::transform::{
        ByteOrder, FlagTransform, IntTransform, ObjectTransform, OptionalTransform,
        RationalTransform, Width,
    };
    use crate::value::{Rational, Record};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn point() -> crate::structure::Structure {
        StructureBuilder::new("point", ByteOrder::Big)
            .uint16("a")
            .uint16("b")
            .build()
            .unwrap()
    }

    #[test]
    fn test_scenario_u16_big_endian() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        assert_eq!(&pack(&Value::UInt(0), &t).unwrap()[..], b"\x00\x00");
        assert_eq!(unpack(&t, b"\x00\x01").unwrap(), Value::UInt(1));
    }

    #[test]
    fn test_scenario_rational_zero() {
        let t = RationalTransform::new(ByteOrder::Big, false);
        let packed = pack(&Value::Rational(Rational::ZERO), &t).unwrap();
        assert_eq!(&packed[..], &[0u8; 8]);
        assert_eq!(
            unpack(&t, &packed).unwrap(),
            Value::Rational(Rational::ZERO)
        );
    }

    #[test]
    fn test_scenario_two_member_structure() {
        let schema = point();
        assert_eq!(calcsize(&schema).unwrap(), 4);

        let v = Value::Record(Record::new().with("a", 1u64).with("b", 2u64));
        let packed = pack(&v, &schema).unwrap();
        assert_eq!(&packed[..], b"\x00\x01\x00\x02");
        assert_eq!(unpack(&schema, &packed).unwrap(), v);
        assert_eq!(packed.len(), calcsize(&schema).unwrap());
    }

    #[test]
    fn test_scenario_optional_tail() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        assert_eq!(unpack(&t, &[]).unwrap(), Value::Nothing);
    }

    #[test]
    fn test_scenario_flag_combination() {
        let t = FlagTransform::new(
            "flash",
            Width::B1,
            ByteOrder::Big,
            &[("flash_fired", 0, 1), ("flash_mode", 1, 2)],
        )
        .unwrap();
        let bits = t
            .compose(&[("flash_fired", 1), ("flash_mode", 3)])
            .unwrap();
        let packed = pack(&Value::Flags(bits), &t).unwrap();
        let v = unpack(&t, &packed).unwrap();
        assert_eq!(v, Value::Flags(bits));
    }

    #[test]
    fn test_boundary_conditions() {
        let schema = point();
        let exact = vec![0u8; calcsize(&schema).unwrap()];
        assert!(unpack(&schema, &exact).is_ok());

        let short = &exact[..exact.len() - 1];
        assert!(unpack(&schema, short).unwrap_err().is_insufficient());

        let mut long = exact.clone();
        long.push(0);
        assert!(unpack(&schema, &long).unwrap_err().is_excess());
    }

    #[test]
    fn test_calcsize_variable_fails() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        assert!(matches!(calcsize(&t).unwrap_err(), Error::Size { .. }));
    }

    #[test]
    fn test_unpack_and_dump_records_walk() {
        let schema = point();
        let (value, dump) = unpack_and_dump(&schema, b"\x00\x01\x00\x02").unwrap();
        assert_eq!(
            value,
            Value::Record(Record::new().with("a", 1u64).with("b", 2u64))
        );

        let a = dump.entry(".a").unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.bytes, vec![0x00, 0x01]);
        assert_eq!(a.value, "1");

        let b = dump.entry(".b").unwrap();
        assert_eq!(b.offset, 2);
        assert_eq!(b.bytes, vec![0x00, 0x02]);

        let root = dump.entry("").unwrap();
        assert_eq!(root.bytes.len(), 4);
    }

    #[test]
    fn test_pack_and_dump_records_walk() {
        let schema = point();
        let v = Value::Record(Record::new().with("a", 1u64).with("b", 2u64));
        let (bytes, dump) = pack_and_dump(&v, &schema).unwrap();
        assert_eq!(&bytes[..], b"\x00\x01\x00\x02");
        assert_eq!(dump.entry(".b").unwrap().offset, 2);
    }

    #[test]
    fn test_failure_error_carries_dump() {
        let schema = point();
        let err = unpack(&schema, b"\x00\x01\x00").unwrap_err();
        assert!(err.is_insufficient());
        // the re-pass enriched the message with the dump table
        let message = err.to_string();
        assert!(message.contains("Access"));
        assert!(message.contains(".a"));
    }

    #[test]
    fn test_nondeterministic_transform_reported_as_defect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let t = ObjectTransform::new(
            "flaky",
            1,
            |_| Ok(vec![0]),
            move |raw| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("transient failure".to_string())
                } else {
                    Ok(Value::UInt(u64::from(raw[0])))
                }
            },
        );

        let err = unpack(&t, &[7]).unwrap_err();
        assert!(matches!(err.canonical(), Error::Implementation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_consistent_failure_keeps_original_kind() {
        let t = ObjectTransform::new(
            "always-bad",
            1,
            |_| Ok(vec![0]),
            |_| Err("bad byte".to_string()),
        );
        let err = unpack(&t, &[7]).unwrap_err();
        assert!(matches!(err.canonical(), Error::Decoding { .. }));
        assert!(err.to_string().contains("bad byte"));
    }

    #[test]
    fn test_view_entry_point() {
        let t = IntTransform::unsigned(Width::B2, ByteOrder::Big);
        let mut buf = vec![0u8, 0, 0, 9];
        let v = view(&t, &mut buf, 2).unwrap();
        assert_eq!(v.get().unwrap(), Value::UInt(9));
    }
}

//! Composite transform combinators: optional tails, opaque domain objects,
//! network addresses, and the zero-width placeholder.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::transform::{Packer, Size, Transform, Unpacker};
use crate::value::Value;

/// Zero-or-one wrapper over an inner transform.
///
/// Packs [`Value::Nothing`] as zero bytes; unpack returns `Nothing` without
/// consuming anything when the window is already empty, and delegates
/// otherwise. Only meaningful as the final member of a variable sequence,
/// which the structure builder enforces.
#[derive(Debug, Clone)]
pub struct OptionalTransform {
    inner: Arc<dyn Transform>,
}

impl OptionalTransform {
    /// Wraps an inner transform
    pub fn new(inner: impl Transform + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Wraps an existing schema node
    pub fn shared(inner: Arc<dyn Transform>) -> Self {
        Self { inner }
    }
}

impl Transform for OptionalTransform {
    fn kind(&self) -> String {
        format!("optional {}", self.inner.kind())
    }

    fn size(&self) -> Size {
        Size::Variable
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        if value.is_nothing() {
            return Ok(());
        }
        self.inner.pack_into(value, dst)
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        if src.remaining() == 0 {
            return Ok(Value::Nothing);
        }
        self.inner.unpack_from(src)
    }
}

/// Pack half of an [`ObjectTransform`]: value in, exactly-width bytes out
pub type PackFn = dyn Fn(&Value) -> std::result::Result<Vec<u8>, String> + Send + Sync;
/// Unpack half of an [`ObjectTransform`]: exactly-width bytes in, value out
pub type UnpackFn = dyn Fn(&[u8]) -> std::result::Result<Value, String> + Send + Sync;

/// Adapter embedding a domain object whose encoding is a pure function of a
/// fixed byte width.
///
/// Failures returned by the caller's closures surface as encoding/decoding
/// errors carrying the caller's message. A pack closure emitting the wrong
/// number of bytes is reported as an implementation defect instead.
#[derive(Clone)]
pub struct ObjectTransform {
    kind: String,
    width: usize,
    pack_fn: Arc<PackFn>,
    unpack_fn: Arc<UnpackFn>,
}

impl ObjectTransform {
    /// Creates an object transform from a kind label, a fixed width, and the
    /// caller's pack/unpack functions
    pub fn new(
        kind: impl Into<String>,
        width: usize,
        pack_fn: impl Fn(&Value) -> std::result::Result<Vec<u8>, String> + Send + Sync + 'static,
        unpack_fn: impl Fn(&[u8]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: kind.into(),
            width,
            pack_fn: Arc::new(pack_fn),
            unpack_fn: Arc::new(unpack_fn),
        }
    }
}

impl fmt::Debug for ObjectTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTransform")
            .field("kind", &self.kind)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

impl Transform for ObjectTransform {
    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn size(&self) -> Size {
        Size::Fixed(self.width)
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        let bytes = (self.pack_fn)(value)
            .map_err(|msg| Error::encoding(dst.path(), self.kind(), msg))?;
        if bytes.len() != self.width {
            return Err(Error::implementation(format!(
                "object transform {} emitted {} byte(s) for a declared width of {}",
                self.kind,
                bytes.len(),
                self.width
            )));
        }
        dst.put_slice(&bytes);
        Ok(())
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let offset = src.offset();
        let raw = src.take(self.width)?;
        (self.unpack_fn)(raw)
            .map_err(|msg| Error::decoding(src.path(), self.kind(), offset, msg))
    }
}

/// IP address version of an [`IpTransform`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// Four octets
    V4,
    /// Sixteen octets
    V6,
}

/// Network address transform; octets travel in network order regardless of
/// the surrounding schema's byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpTransform {
    version: IpVersion,
}

impl IpTransform {
    /// Creates an IPv4 address transform
    pub const fn v4() -> Self {
        Self {
            version: IpVersion::V4,
        }
    }

    /// Creates an IPv6 address transform
    pub const fn v6() -> Self {
        Self {
            version: IpVersion::V6,
        }
    }

    fn nbytes(&self) -> usize {
        match self.version {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }
}

impl Transform for IpTransform {
    fn kind(&self) -> String {
        match self.version {
            IpVersion::V4 => "ipv4".to_string(),
            IpVersion::V6 => "ipv6".to_string(),
        }
    }

    fn size(&self) -> Size {
        Size::Fixed(self.nbytes())
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        match (self.version, value) {
            (IpVersion::V4, Value::Ip(IpAddr::V4(addr))) => {
                dst.put_slice(&addr.octets());
                Ok(())
            }
            (IpVersion::V6, Value::Ip(IpAddr::V6(addr))) => {
                dst.put_slice(&addr.octets());
                Ok(())
            }
            (_, Value::Ip(_)) => Err(Error::encoding(
                dst.path(),
                self.kind(),
                "address version does not match the transform",
            )),
            _ => Err(Error::encoding(
                dst.path(),
                self.kind(),
                format!("expected an ip address, got {}", value.type_name()),
            )),
        }
    }

    fn unpack_from(&self, src: &mut Unpacker<'_>) -> Result<Value> {
        let raw = src.take(self.nbytes())?;
        let addr = match self.version {
            IpVersion::V4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(raw);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IpVersion::V6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(raw);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };
        Ok(Value::Ip(addr))
    }
}

/// Zero-width placeholder whose only legal value is [`Value::Nothing`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoneTransform;

impl NoneTransform {
    /// Creates the placeholder transform
    pub const fn new() -> Self {
        Self
    }
}

impl Transform for NoneTransform {
    fn kind(&self) -> String {
        "none".to_string()
    }

    fn size(&self) -> Size {
        Size::Fixed(0)
    }

    fn pack_into(&self, value: &Value, dst: &mut Packer) -> Result<()> {
        if !value.is_nothing() {
            return Err(Error::encoding(
                dst.path(),
                self.kind(),
                format!("expected nothing, got {}", value.type_name()),
            ));
        }
        Ok(())
    }

    fn unpack_from(&self, _src: &mut Unpacker<'_>) -> Result<Value> {
        Ok(Value::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{calcsize, pack, unpack};
    use crate::transform::{ByteOrder, IntTransform, Width};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_optional_absent_on_empty_buffer() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        assert_eq!(unpack(&t, &[]).unwrap(), Value::Nothing);
    }

    #[test]
    fn test_optional_present_delegates() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        assert_eq!(unpack(&t, b"\x00\x05").unwrap(), Value::UInt(5));

        assert_eq!(pack(&Value::Nothing, &t).unwrap().len(), 0);
        assert_eq!(&pack(&Value::UInt(5), &t).unwrap()[..], b"\x00\x05");
    }

    #[test]
    fn test_optional_has_no_fixed_size() {
        let t = OptionalTransform::new(IntTransform::unsigned(Width::B2, ByteOrder::Big));
        assert!(calcsize(&t).is_err());
    }

    fn mac_transform() -> ObjectTransform {
        ObjectTransform::new(
            "mac",
            6,
            |value| match value {
                Value::Bytes(b) if b.len() == 6 => Ok(b.clone()),
                _ => Err("expected six mac octets".to_string()),
            },
            |raw| Ok(Value::Bytes(raw.to_vec())),
        )
    }

    #[test]
    fn test_object_round_trip() {
        let t = mac_transform();
        let v = Value::Bytes(vec![0, 1, 2, 3, 4, 5]);
        let packed = pack(&v, &t).unwrap();
        assert_eq!(packed.len(), 6);
        assert_eq!(unpack(&t, &packed).unwrap(), v);
    }

    #[test]
    fn test_object_pack_failure_wrapped() {
        let t = mac_transform();
        let err = pack(&Value::UInt(1), &t).unwrap_err();
        assert!(matches!(err.canonical(), Error::Encoding { .. }));
        assert!(err.to_string().contains("expected six mac octets"));
    }

    #[test]
    fn test_object_width_defect_surfaced() {
        let t = ObjectTransform::new(
            "broken",
            4,
            |_| Ok(vec![1, 2]),
            |raw| Ok(Value::Bytes(raw.to_vec())),
        );
        let err = pack(&Value::Nothing, &t).unwrap_err();
        assert!(matches!(err.canonical(), Error::Implementation { .. }));
    }

    #[test]
    fn test_ipv4_round_trip() {
        let t = IpTransform::v4();
        let v = Value::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
        let packed = pack(&v, &t).unwrap();
        assert_eq!(&packed[..], &[192, 168, 0, 1]);
        assert_eq!(unpack(&t, &packed).unwrap(), v);
    }

    #[test]
    fn test_ipv6_round_trip() {
        let t = IpTransform::v6();
        let v = Value::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST));
        let packed = pack(&v, &t).unwrap();
        assert_eq!(packed.len(), 16);
        assert_eq!(unpack(&t, &packed).unwrap(), v);
    }

    #[test]
    fn test_ip_version_mismatch_rejected() {
        let t = IpTransform::v6();
        let v = Value::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(pack(&v, &t).is_err());
    }

    #[test]
    fn test_none_zero_width() {
        let t = NoneTransform::new();
        assert_eq!(calcsize(&t).unwrap(), 0);
        assert_eq!(pack(&Value::Nothing, &t).unwrap().len(), 0);
        assert_eq!(unpack(&t, &[]).unwrap(), Value::Nothing);
        assert!(pack(&Value::UInt(1), &t).is_err());
    }
}

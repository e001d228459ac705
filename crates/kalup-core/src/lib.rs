//! # kalup-core
//!
//! A library for mapping structured records to and from exact byte layouts
//! using declarative, byte-order-aware schemas.
//!
//! This crate provides the core functionality for:
//! - Composing primitive transforms (integers, floats, decimals, rationals,
//!   enums, flags) into structures with named, ordered members
//! - Packing values to bytes and unpacking bytes to values with atomic
//!   failure semantics
//! - In-place, zero-copy access to fixed-size records inside larger buffers
//! - Rich diagnostic dumps describing every field of a failed walk
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`transform`]: The [`Transform`] trait and the primitive/composite nodes
//! - [`structure`]: The structure engine and its builder
//! - [`codec`]: Top-level pack/unpack/calcsize/view operations
//! - [`view`]: Zero-copy windows over caller-owned buffers
//! - [`dump`]: Diagnostic traces for error reporting
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use kalup_core::{pack, unpack, ByteOrder, Record, StructureBuilder, Value};
//!
//! // Schemas are built once and shared; byte order is chosen up front.
//! let schema = StructureBuilder::new("point", ByteOrder::Big)
//!     .uint16("a")
//!     .uint16("b")
//!     .build()?;
//!
//! let value = Value::Record(Record::new().with("a", 1u64).with("b", 2u64));
//! let bytes = pack(&value, &schema)?;
//! assert_eq!(&bytes[..], b"\x00\x01\x00\x02");
//! assert_eq!(unpack(&schema, &bytes)?, value);
//! # Ok::<(), kalup_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Domain objects with a fixed-width encoding plug in through
//! [`ObjectTransform`], which wraps caller-supplied pack/unpack functions;
//! their failures surface as ordinary encoding/decoding errors.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod dump;
pub mod error;
pub mod structure;
pub mod transform;
pub mod value;
pub mod view;

// Re-export primary types for convenience
pub use codec::{calcsize, pack, pack_and_dump, unpack, unpack_and_dump, view};
pub use dump::{Dump, DumpEntry};
pub use error::{Error, Result};
pub use structure::{Structure, StructureBuilder};
pub use transform::{
    ByteOrder, BytesTransform, DecimalTransform, EnumTransform, FlagTransform, FloatTransform,
    FloatWidth, IntTransform, IpTransform, IpVersion, ListTransform, NoneTransform,
    ObjectTransform, OptionalTransform, RationalTransform, Size, Transform, Width,
};
pub use value::{Rational, Record, Value};
pub use view::View;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

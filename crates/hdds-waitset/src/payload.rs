// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload contract between typed publishers and subscribers.
//!
//! Every chunk carries the 64-bit type identity of the payload it holds
//! (FNV-1a over the type name, mixed with the version). Subscribers compare it
//! before decoding, so a publisher and a subscriber disagreeing on the type of
//! a service produce [`ReceiveError::TypeMismatch`](crate::ReceiveError)
//! instead of garbage.
//!
//! # Example
//!
//! ```rust
//! use hdds_waitset::codec::{PayloadReader, PayloadWriter};
//! use hdds_waitset::{Payload, Result};
//!
//! #[derive(Debug, PartialEq)]
//! struct Position {
//!     x: f64,
//!     y: f64,
//! }
//!
//! impl Payload for Position {
//!     const TYPE_NAME: &'static str = "demo::Position";
//!
//!     fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()> {
//!         writer.write_f64(self.x)?;
//!         writer.write_f64(self.y)
//!     }
//!
//!     fn decode(reader: &mut PayloadReader<'_>) -> Result<Self> {
//!         Ok(Self {
//!             x: reader.read_f64()?,
//!             y: reader.read_f64()?,
//!         })
//!     }
//! }
//!
//! assert_ne!(Position::payload_type_id(), u64::payload_type_id());
//! ```

use crate::codec::{PayloadReader, PayloadWriter};
use crate::Result;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64 of `name` followed by the little-endian `version`.
#[must_use]
pub const fn type_id_of(name: &str, version: u32) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    let version = version.to_le_bytes();
    let mut j = 0;
    while j < version.len() {
        hash ^= version[j] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        j += 1;
    }
    hash
}

/// A type that can travel through a service channel.
pub trait Payload: Sized + Send + 'static {
    /// Stable, fully qualified type name.
    const TYPE_NAME: &'static str;
    /// Bump when the encoding changes incompatibly.
    const TYPE_VERSION: u32 = 1;

    fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()>;

    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self>;

    /// Identity stamped into every chunk header.
    #[must_use]
    fn payload_type_id() -> u64 {
        type_id_of(Self::TYPE_NAME, Self::TYPE_VERSION)
    }
}

macro_rules! impl_primitive_payload {
    ($type:ty, $name:expr, $write:ident, $read:ident) => {
        impl Payload for $type {
            const TYPE_NAME: &'static str = $name;

            fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()> {
                writer.$write(*self)
            }

            fn decode(reader: &mut PayloadReader<'_>) -> Result<Self> {
                reader.$read()
            }
        }
    };
}

impl_primitive_payload!(u8, "u8", write_u8, read_u8);
impl_primitive_payload!(u32, "u32", write_u32, read_u32);
impl_primitive_payload!(u64, "u64", write_u64, read_u64);
impl_primitive_payload!(i32, "i32", write_i32, read_i32);
impl_primitive_payload!(i64, "i64", write_i64, read_i64);
impl_primitive_payload!(f64, "f64", write_f64, read_f64);
impl_primitive_payload!(bool, "bool", write_bool, read_bool);

impl Payload for String {
    const TYPE_NAME: &'static str = "string";

    fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()> {
        writer.write_str(self)
    }

    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self> {
        reader.read_str().map(str::to_owned)
    }
}

impl Payload for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()> {
        writer.write_seq(self)
    }

    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self> {
        reader.read_seq().map(<[u8]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_reference_vector() {
        // FNV-1a 64 of "a" is 0xaf63dc4c8601ec8c; the version bytes follow.
        let mut expected: u64 = 0xaf63_dc4c_8601_ec8c;
        for byte in 1u32.to_le_bytes() {
            expected ^= u64::from(byte);
            expected = expected.wrapping_mul(FNV_PRIME);
        }
        assert_eq!(type_id_of("a", 1), expected);
    }

    #[test]
    fn test_version_changes_identity() {
        assert_ne!(type_id_of("demo::Position", 1), type_id_of("demo::Position", 2));
        assert_ne!(u32::payload_type_id(), u64::payload_type_id());
    }

    #[test]
    fn test_string_payload_decodes() {
        let mut buf = Vec::new();
        "hello"
            .to_string()
            .encode(&mut PayloadWriter::new(&mut buf, 64))
            .expect("encode");
        let decoded = String::decode(&mut PayloadReader::new(&buf)).expect("decode");
        assert_eq!(decoded, "hello");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Little-endian payload writer/reader used by [`Payload`](crate::Payload) impls.
//!
//! Strings and byte sequences carry a `u32` length prefix. Writes are bounded
//! by the chunk pool's `max_payload_size`; reads are bounds-checked.

use crate::{Error, Result};

/// Generate append methods for primitive types.
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> Result<()> {
            self.write_bytes(&value.to_le_bytes())
        }
    };
}

/// Generate bounds-checked read methods for primitive types.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let raw = self.take_slice($size)?;
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(raw);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Appending writer over a pooled chunk buffer.
pub struct PayloadWriter<'a> {
    buffer: &'a mut Vec<u8>,
    max_len: usize,
}

impl<'a> PayloadWriter<'a> {
    /// Wrap `buffer`; writes past `max_len` total bytes fail.
    pub fn new(buffer: &'a mut Vec<u8>, max_len: usize) -> Self {
        Self { buffer, max_len }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_i64, i64);

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Length-prefixed byte sequence.
    pub fn write_seq(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            Error::SerializationError(format!("sequence of {} bytes too long", data.len()))
        })?;
        self.write_u32(len)?;
        self.write_bytes(data)
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_seq(value.as_bytes())
    }

    /// Raw bytes without a length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let size = self.buffer.len() + data.len();
        if size > self.max_len {
            return Err(Error::PayloadTooLarge {
                size,
                max: self.max_len,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Bounds-checked reader over a received chunk.
pub struct PayloadReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_i64, i64, 8);

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_u64().map(f64::from_bits)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::SerializationError(format!(
                "invalid bool byte 0x{:02x} at offset {}",
                other,
                self.offset - 1
            ))),
        }
    }

    /// Length-prefixed byte sequence, borrowed from the chunk.
    pub fn read_seq(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take_slice(len)
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let start = self.offset;
        let raw = self.read_seq()?;
        std::str::from_utf8(raw).map_err(|e| {
            Error::SerializationError(format!("invalid UTF-8 at offset {}: {}", start, e))
        })
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take_slice(len)
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::SerializationError(format!(
                "unexpected end of payload: need {} bytes at offset {}, {} left",
                len,
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_fields_read_back_in_order() {
        let mut buf = Vec::new();
        let mut writer = PayloadWriter::new(&mut buf, 128);
        writer.write_u32(7).expect("u32");
        writer.write_str("odometry").expect("str");
        writer.write_f64(1.5).expect("f64");
        writer.write_bool(true).expect("bool");
        assert_eq!(writer.len(), 4 + 4 + 8 + 8 + 1);

        let mut reader = PayloadReader::new(&buf);
        assert_eq!(reader.read_u32().expect("u32"), 7);
        assert_eq!(reader.read_str().expect("str"), "odometry");
        assert_eq!(reader.read_f64().expect("f64"), 1.5);
        assert!(reader.read_bool().expect("bool"));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_writer_enforces_max_len() {
        let mut buf = Vec::new();
        let mut writer = PayloadWriter::new(&mut buf, 6);
        writer.write_u32(1).expect("fits");
        let err = writer.write_u32(2).expect_err("exceeds max");
        assert!(matches!(err, Error::PayloadTooLarge { size: 8, max: 6 }));
        assert_eq!(buf.len(), 4, "failed write leaves buffer untouched");
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut reader = PayloadReader::new(&[1, 0]);
        assert!(matches!(
            reader.read_u32(),
            Err(Error::SerializationError(_))
        ));

        // length prefix claims more bytes than present
        let mut reader = PayloadReader::new(&[10, 0, 0, 0, b'a']);
        assert!(reader.read_str().is_err());
    }

    #[test]
    fn test_invalid_bool_and_utf8() {
        let mut reader = PayloadReader::new(&[2]);
        assert!(reader.read_bool().is_err());

        let mut reader = PayloadReader::new(&[2, 0, 0, 0, 0xff, 0xfe]);
        assert!(reader.read_str().is_err());
    }
}

//! Minimal command-packet reader and reply writer.
//!
//! Integers are big-endian; byte arrays are prefixed with an `i32` length.
//! Framing onto a connection happens outside this crate.

use crate::error::{ErrorCode, StreamError, StreamResult};

/// Cursor over the data section of one incoming command packet.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn read_i32(&mut self) -> StreamResult<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Copies `len` bytes into a new buffer owned by the caller.
    pub fn read_bytes(&mut self, len: usize) -> StreamResult<Vec<u8>> {
        self.take(len).map(<[u8]>::to_vec)
    }

    /// Reads an `i32` length prefix followed by that many bytes.
    pub fn read_byte_array(&mut self) -> StreamResult<Vec<u8>> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| StreamError::NegativeLength(len))?;
        self.read_bytes(len)
    }

    fn take(&mut self, len: usize) -> StreamResult<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(StreamError::Truncated {
                needed: len,
                available,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }
}

/// Reply under construction: either data fields or a single error code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketWriter {
    data: Vec<u8>,
    error: Option<ErrorCode>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends raw bytes without a length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Marks the reply as an error; any data already written is discarded.
    pub fn set_error(&mut self, code: ErrorCode) {
        self.data.clear();
        self.error = Some(code);
    }

    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.error.is_none()
    }

    pub fn into_parts(self) -> (Option<ErrorCode>, Vec<u8>) {
        (self.error, self.data)
    }
}

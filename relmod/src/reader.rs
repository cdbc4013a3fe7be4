//! Binary reader over a RELMOD stream.
//!
//! All integers in the container are little-endian. Every read is bounds
//! checked and reports `TruncatedStream` with the offending offset.

use alloc::string::String;

use crate::RelmodError;

/// Binary reader with position tracking.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new binary reader positioned at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, pos: 0 }
    }

    /// Current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying stream.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute offset.
    ///
    /// Seeking past the end is allowed; the next read fails instead.
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    /// Advance the cursor to the next multiple of `align`.
    pub fn align_to(&mut self, align: usize) {
        let delta = self.pos % align;
        if delta != 0 {
            self.pos += align - delta;
        }
    }

    fn truncated(&self, offset: usize, wanted: usize) -> RelmodError {
        RelmodError::TruncatedStream { offset, wanted }
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8, RelmodError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| self.truncated(self.pos, 1))?;
        self.pos += 1;
        Ok(b)
    }

    /// Read N bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], RelmodError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.truncated(self.pos, n))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a u16 in little-endian.
    pub fn read_u16_le(&mut self) -> Result<u16, RelmodError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a u32 in little-endian.
    pub fn read_u32_le(&mut self) -> Result<u32, RelmodError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read an ASCII name ending at any byte in `terminators`.
    ///
    /// The terminator is consumed but not part of the result. Bytes are
    /// widened one-to-one into `char`s. At most `max_len` bytes are scanned
    /// before the terminator; a longer name is `MalformedHeader`.
    pub fn read_terminated(
        &mut self,
        terminators: &[u8],
        max_len: usize,
    ) -> Result<String, RelmodError> {
        let start = self.pos;
        let mut name = String::new();
        let mut scanned = 0;

        loop {
            let b = self.read_byte()?;
            if terminators.contains(&b) {
                return Ok(name);
            }
            if scanned >= max_len {
                return Err(RelmodError::MalformedHeader(alloc::format!(
                    "name at {:#x} exceeds {} bytes",
                    start, max_len
                )));
            }
            name.push(b as char);
            scanned += 1;
        }
    }

    /// Read a terminated name at an absolute offset, leaving the cursor where it was.
    pub fn read_terminated_at(
        &mut self,
        offset: usize,
        terminators: &[u8],
        max_len: usize,
    ) -> Result<String, RelmodError> {
        let saved = self.pos;
        self.pos = offset;
        let result = self.read_terminated(terminators, max_len);
        self.pos = saved;
        result
    }
}

use bytes::{Bytes, BytesMut};

use super::error::DecodingError;
use super::tags;

/// An append-only byte buffer with an independent write cursor (its length)
/// and read cursor, used as the wire representation ETF encode/decode
/// operate over directly.
///
/// Two constructors mirror the two legal ETF payload shapes: [`Buffer::new`]
/// produces bare term bytes (no version marker), [`Buffer::with_version`]
/// leads with the version byte `131`. Decoding a payload that may or may
/// not carry that leading byte goes through [`Buffer::consume_version`].
#[derive(Debug, Clone)]
pub struct Buffer {
    data: BytesMut,
    read_pos: usize,
    versioned: bool,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            read_pos: 0,
            versioned: false,
        }
    }

    pub fn with_version() -> Self {
        let mut buf = Self::new();
        buf.append_byte(tags::VERSION);
        buf.versioned = true;
        buf
    }

    /// Wrap externally received bytes (e.g. a frame just read off a socket)
    /// for decoding. The read cursor starts at zero.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            data: BytesMut::from(bytes.into()),
            read_pos: 0,
            versioned: false,
        }
    }

    pub fn append_byte(&mut self, byte: u8) {
        self.data.extend_from_slice(&[byte]);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`, which must
    /// already be within the written region.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Length of everything written so far; the invariant the buffer
    /// upholds is that this always equals the number of bytes emitted.
    pub fn write_pos(&self) -> usize {
        self.data.len()
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Rewind (or fast-forward) the read cursor to a previously observed
    /// offset. Used by the keyed decoder to revisit a field after an
    /// initial indexing pass.
    pub fn set_read_pos(&mut self, pos: usize) {
        self.read_pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    pub fn is_exhausted(&self) -> bool {
        self.read_pos >= self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.data.clone().freeze()
    }

    /// Peek the next tag byte without advancing the read cursor.
    pub fn read_tag(&self) -> Result<u8, DecodingError> {
        self.data
            .get(self.read_pos)
            .copied()
            .ok_or(DecodingError::Eof("tag"))
    }

    /// Consume the leading version byte if the decode is expected to see
    /// one. Call this once before decoding the first term of a payload
    /// that was produced with [`Buffer::with_version`].
    pub fn consume_version(&mut self) -> Result<(), DecodingError> {
        let tag = self.read_u8()?;
        if tag != tags::VERSION {
            return Err(DecodingError::BadTerm("expected ETF version byte 131"));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodingError> {
        let byte = self
            .data
            .get(self.read_pos)
            .copied()
            .ok_or(DecodingError::Eof("u8"))?;
        self.read_pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodingError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodingError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodingError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodingError> {
        let bytes = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(arr))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodingError> {
        let bytes = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(arr))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8], DecodingError> {
        let end = self
            .read_pos
            .checked_add(n)
            .ok_or(DecodingError::Eof("bytes"))?;
        if end > self.data.len() {
            return Err(DecodingError::Eof("bytes"));
        }
        let slice = &self.data[self.read_pos..end];
        self.read_pos = end;
        Ok(slice)
    }

    /// Append another buffer's term payload (skipping its version byte, if
    /// any) onto the end of this one. Used when splicing an already-encoded
    /// subterm into a larger message without re-encoding it.
    pub fn append_buffer(&mut self, other: &Buffer) {
        let start = if other.versioned { 1 } else { 0 };
        self.append_bytes(&other.data[start..]);
    }

    /// Advance the read cursor over exactly one well-formed term without
    /// materialising it. Runs in O(size-of-term) and performs no heap
    /// allocation.
    pub fn skip_term(&mut self) -> Result<(), DecodingError> {
        let tag = self.read_u8()?;
        match tag {
            tags::SMALL_INTEGER => {
                self.read_u8()?;
            }
            tags::INTEGER | tags::NEW_FLOAT => {
                self.read_bytes(if tag == tags::INTEGER { 4 } else { 8 })?;
            }
            tags::FLOAT_EXT => {
                self.read_bytes(31)?;
            }
            tags::ATOM | tags::ATOM_UTF8 => {
                let len = self.read_u16()? as usize;
                self.read_bytes(len)?;
            }
            tags::SMALL_ATOM | tags::SMALL_ATOM_UTF8 => {
                let len = self.read_u8()? as usize;
                self.read_bytes(len)?;
            }
            tags::SMALL_TUPLE => {
                let arity = self.read_u8()? as usize;
                for _ in 0..arity {
                    self.skip_term()?;
                }
            }
            tags::LARGE_TUPLE => {
                let arity = self.read_u32()? as usize;
                for _ in 0..arity {
                    self.skip_term()?;
                }
            }
            tags::NIL => {}
            tags::STRING => {
                let len = self.read_u16()? as usize;
                self.read_bytes(len)?;
            }
            tags::LIST => {
                let len = self.read_u32()? as usize;
                for _ in 0..len {
                    self.skip_term()?;
                }
                self.skip_term()?; // tail
            }
            tags::BINARY => {
                let len = self.read_u32()? as usize;
                self.read_bytes(len)?;
            }
            tags::BIT_BINARY => {
                let len = self.read_u32()? as usize;
                self.read_u8()?; // bit offset
                self.read_bytes(len)?;
            }
            tags::SMALL_BIG => {
                let n = self.read_u8()? as usize;
                self.read_u8()?; // sign
                self.read_bytes(n)?;
            }
            tags::LARGE_BIG => {
                let n = self.read_u32()? as usize;
                self.read_u8()?; // sign
                self.read_bytes(n)?;
            }
            tags::MAP => {
                let arity = self.read_u32()? as usize;
                for _ in 0..arity {
                    self.skip_term()?;
                    self.skip_term()?;
                }
            }
            tags::PID | tags::NEW_PID => {
                self.skip_term()?; // node atom
                self.read_bytes(if tag == tags::NEW_PID { 12 } else { 9 })?;
            }
            tags::PORT | tags::NEW_PORT => {
                self.skip_term()?;
                self.read_bytes(if tag == tags::NEW_PORT { 8 } else { 5 })?;
            }
            tags::REFERENCE => {
                self.skip_term()?;
                self.read_bytes(5)?;
            }
            tags::NEW_REFERENCE => {
                let len = self.read_u16()? as usize;
                self.skip_term()?;
                self.read_bytes(1 + len * 4)?;
            }
            tags::NEWER_REFERENCE => {
                let len = self.read_u16()? as usize;
                self.skip_term()?;
                self.read_bytes(4 + len * 4)?;
            }
            tags::EXPORT => {
                self.skip_term()?; // module
                self.skip_term()?; // function
                self.skip_term()?; // arity
            }
            tags::NEW_FUN => {
                let size = self.read_u32()? as usize;
                // `size` includes the tag byte and the 4-byte size field
                // itself; we've already consumed 5 bytes.
                self.read_bytes(size.saturating_sub(5))?;
            }
            tags::FUN => {
                let num_free = self.read_u32()? as usize;
                self.skip_term()?; // pid
                self.skip_term()?; // module
                self.skip_term()?; // index
                self.skip_term()?; // uniq
                for _ in 0..num_free {
                    self.skip_term()?;
                }
            }
            other => return Err(DecodingError::UnknownTag(other)),
        }
        Ok(())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

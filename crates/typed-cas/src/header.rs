//! Record header codec.
//!
//! Every stored record is `header || content-type || body`. The header is a
//! fixed 5 bytes:
//!
//! ```text
//! offset  size  field
//! 0       1     content-type length (0..=127)
//! 1       4     body length, big-endian u32
//! ```

use std::io::{self, Write};

use crate::error::{CasError, Result, Stage};

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 5;

/// Largest content-type length; the top bit of the length byte stays clear.
pub const MAX_CONTENT_TYPE_LEN: usize = i8::MAX as usize;

/// Largest body length.
pub const MAX_BODY_LEN: usize = u32::MAX as usize;

/// Lengths of the two variable fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    type_len: u8,
    body_len: u32,
}

impl Header {
    /// Build a header from raw lengths, rejecting anything out of range.
    pub fn new(type_len: usize, body_len: usize) -> Result<Self> {
        validate(type_len, body_len)?;
        Ok(Self {
            type_len: type_len as u8,
            body_len: body_len as u32,
        })
    }

    /// Header describing the given content-type and body.
    pub fn for_content(content_type: &[u8], body: &[u8]) -> Result<Self> {
        Self::new(content_type.len(), body.len())
    }

    pub fn type_len(&self) -> usize {
        self.type_len as usize
    }

    pub fn body_len(&self) -> usize {
        self.body_len as usize
    }

    /// Size of the full record this header describes, saturating at `usize::MAX`.
    pub fn total_size(&self) -> usize {
        HEADER_LEN
            .saturating_add(self.type_len())
            .saturating_add(self.body_len())
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.type_len;
        buf[1..].copy_from_slice(&self.body_len.to_be_bytes());
        buf
    }

    /// Inverse of [`encode`](Self::encode). No range checks beyond the byte widths.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            type_len: buf[0],
            body_len: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        }
    }
}

/// Range check shared by every header constructor.
pub fn validate(type_len: usize, body_len: usize) -> Result<()> {
    if body_len > MAX_BODY_LEN {
        return Err(CasError::BodyTooBig { len: body_len });
    }
    if type_len > MAX_CONTENT_TYPE_LEN {
        return Err(CasError::ContentTypeTooBig { len: type_len });
    }
    Ok(())
}

/// Stream header, content-type and body into `w`, in that order.
///
/// On failure returns the stage that failed alongside the I/O error.
pub fn write_record<W: Write + ?Sized>(
    w: &mut W,
    header: &Header,
    content_type: &[u8],
    body: &[u8],
) -> std::result::Result<(), (Stage, io::Error)> {
    w.write_all(&header.encode())
        .map_err(|e| (Stage::Header, e))?;
    w.write_all(content_type)
        .map_err(|e| (Stage::ContentType, e))?;
    w.write_all(body).map_err(|e| (Stage::Body, e))?;
    Ok(())
}

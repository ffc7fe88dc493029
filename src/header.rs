//! Fixed-layout container header.
//!
//! ```text
//! offset   0    8 B   magic            "MD5PACK\0"
//! offset   8  255 B   file_name        zero-padded byte string
//! offset 263    8 B   file_size        u64
//! offset 271   16 B   digest           MD5 of the payload
//! offset 287    2 B   payload_start    u16, always HEADER_LEN
//! offset 289    8 B   payload_end      u64, payload_start + file_size
//! offset 297          payload
//! ```
//!
//! All integers are little-endian. Fields are read and written one by one,
//! so the layout never depends on in-memory struct packing.

use byteorder::{LittleEndian, ReadBytesExt};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::checksum::{Digest, DIGEST_LEN};

pub const MAGIC: &[u8; MAGIC_LEN] = b"MD5PACK\0";
pub const MAGIC_LEN: usize = 8;
/// Byte capacity of the file name field.
pub const FILE_NAME_LEN: usize = 255;
/// Total length of the serialized header region, payload offsets included.
pub const HEADER_LEN: usize = MAGIC_LEN + FILE_NAME_LEN + 8 + DIGEST_LEN + 2 + 8;
/// Extension given to containers produced by `store`.
pub const FILE_EXTENSION: &str = "md5pack";

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("not a valid MD5PACK file (bad magic)")]
    BadMagic,
    #[error("MD5PACK file corrupt (zero payload size)")]
    ZeroSize,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Original base name, without the zero padding.
    pub file_name: Vec<u8>,
    pub file_size: u64,
    pub digest: Digest,
    pub payload_start: u16,
    /// Informational only; never checked against the real container length.
    pub payload_end: u64,
}

impl ContainerHeader {
    /// Build a header for a payload. Names longer than [`FILE_NAME_LEN`]
    /// bytes are truncated.
    pub fn new(file_name: &[u8], file_size: u64, digest: Digest) -> Self {
        let name_len = file_name.len().min(FILE_NAME_LEN);
        let payload_start = HEADER_LEN as u16;
        Self {
            file_name: file_name[..name_len].to_vec(),
            file_size,
            digest,
            payload_start,
            payload_end: u64::from(payload_start).saturating_add(file_size),
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Parse a header. The magic is checked before anything else is read.
    ///
    /// A source shorter than [`MAGIC_LEN`] bytes is a bad magic. A valid
    /// magic followed by less than a full header is treated as corrupt
    /// (`ZeroSize`): the payload size was never completely recorded.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let mut magic = Vec::with_capacity(MAGIC_LEN);
        (&mut reader).take(MAGIC_LEN as u64).read_to_end(&mut magic)?;
        if magic.as_slice() != MAGIC {
            return Err(FormatError::BadMagic);
        }

        let mut rest = Vec::with_capacity(HEADER_LEN - MAGIC_LEN);
        (&mut reader).take((HEADER_LEN - MAGIC_LEN) as u64).read_to_end(&mut rest)?;
        if rest.len() < HEADER_LEN - MAGIC_LEN {
            return Err(FormatError::ZeroSize);
        }

        let mut fields = rest.as_slice();
        let mut name = [0u8; FILE_NAME_LEN];
        fields.read_exact(&mut name)?;
        let file_size = fields.read_u64::<LittleEndian>()?;
        let mut digest = [0u8; DIGEST_LEN];
        fields.read_exact(&mut digest)?;
        let payload_start = fields.read_u16::<LittleEndian>()?;
        let payload_end = fields.read_u64::<LittleEndian>()?;

        if file_size == 0 {
            return Err(FormatError::ZeroSize);
        }

        let name_len = name.iter().position(|&b| b == 0).unwrap_or(FILE_NAME_LEN);
        Ok(Self {
            file_name: name[..name_len].to_vec(),
            file_size,
            digest,
            payload_start,
            payload_end,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let name_len = self.file_name.len().min(FILE_NAME_LEN);

        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.file_name[..name_len]);
        out.resize(MAGIC_LEN + FILE_NAME_LEN, 0);
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&self.digest);
        out.extend_from_slice(&self.payload_start.to_le_bytes());
        out.extend_from_slice(&self.payload_end.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::read(bytes)
    }

    pub fn file_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.file_name)
    }

    pub fn file_name_os(&self) -> OsString {
        name_from_bytes(&self.file_name)
    }
}

// ── File name bytes ──────────────────────────────────────────────────────────

/// Raw bytes of a file name as stored in the header.
#[cfg(unix)]
pub fn name_to_bytes(name: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn name_to_bytes(name: &OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub fn name_from_bytes(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes.to_vec())
}

#[cfg(not(unix))]
pub fn name_from_bytes(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

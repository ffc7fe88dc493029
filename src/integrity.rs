//! Container integrity check.
//!
//! Parses the header, re-reads exactly `file_size` payload bytes from
//! `payload_start` and compares their MD5 with the stored digest. The check
//! never writes to the container.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::checksum::{digest_reader_capped, to_hex, Digest};
use crate::header::{ContainerHeader, FormatError};

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error(transparent)]
    Format(FormatError),
    #[error("integrity check failed: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    Mismatch { expected: Digest, actual: Digest },
    #[error("payload truncated: header declares {expected} bytes, container holds {actual}")]
    Truncated { expected: u64, actual: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<FormatError> for IntegrityError {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::Io(io) => IntegrityError::Io(io),
            other => IntegrityError::Format(other),
        }
    }
}

impl IntegrityError {
    /// True for malformed headers (bad magic or zero size).
    pub fn is_bad_format(&self) -> bool {
        matches!(self, IntegrityError::Format(FormatError::BadMagic | FormatError::ZeroSize))
    }
}

/// Outcome of a successful check; its `Display` is the header echo shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub header: ContainerHeader,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MD5PACK header found")?;
        writeln!(f, "\tTarget name: {}", self.header.file_name_lossy())?;
        writeln!(f, "\tTarget size: {}", self.header.file_size)?;
        write!(f, "\tTarget checksum: {}", to_hex(&self.header.digest))
    }
}

/// Verify the container at `path`.
pub fn check<P: AsRef<Path>>(path: P) -> Result<CheckReport, IntegrityError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "checking container");
    check_reader(File::open(path)?)
}

/// Verify a container held in any seekable stream.
pub fn check_reader<R: Read + Seek>(mut reader: R) -> Result<CheckReport, IntegrityError> {
    reader.seek(SeekFrom::Start(0))?;
    // Rejects bad magic and zero-size headers.
    let header = ContainerHeader::read(&mut reader)?;

    reader.seek(SeekFrom::Start(u64::from(header.payload_start)))?;
    let (actual, hashed) = digest_reader_capped(&mut reader, header.file_size)?;
    debug!(payload_start = header.payload_start, file_size = header.file_size, hashed, "payload digested");

    if hashed < header.file_size {
        warn!(expected = header.file_size, actual = hashed, "container payload truncated");
        return Err(IntegrityError::Truncated { expected: header.file_size, actual: hashed });
    }
    if actual != header.digest {
        warn!(expected = %to_hex(&header.digest), actual = %to_hex(&actual), "digest mismatch");
        return Err(IntegrityError::Mismatch { expected: header.digest, actual });
    }

    Ok(CheckReport { header })
}

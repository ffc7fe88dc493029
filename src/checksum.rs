//! MD5 checksum engine.
//!
//! Every digest in a container is computed over the raw payload bytes only.
//! Reads are done in bounded chunks of [`READ_CHUNK_SIZE`] bytes; the chunk
//! size affects throughput, never the resulting digest.

use md5::{Digest as _, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Width of an MD5 digest in bytes.
pub const DIGEST_LEN: usize = 16;
/// Bytes requested from the underlying reader per `read` call.
pub const READ_CHUNK_SIZE: usize = 4096;

/// A finished 16-byte MD5 digest.
pub type Digest = [u8; DIGEST_LEN];

/// Digest everything `reader` yields until end-of-stream.
pub fn digest_reader<R: Read>(reader: R) -> io::Result<Digest> {
    digest_reader_capped(reader, u64::MAX).map(|(digest, _)| digest)
}

/// Digest at most `limit` bytes from `reader`.
///
/// Returns the digest together with the number of bytes actually hashed,
/// which is smaller than `limit` when the stream ends early.
pub fn digest_reader_capped<R: Read>(mut reader: R, limit: u64) -> io::Result<(Digest, u64)> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let mut remaining = limit;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    Ok((digest, limit - remaining))
}

/// Open `path` and digest its full contents.
pub fn digest_file<P: AsRef<Path>>(path: P) -> io::Result<Digest> {
    digest_reader(File::open(path)?)
}

/// Lowercase hex rendering used in reports and logs.
pub fn to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}

//! Store and extract pipelines, the primary embedding surface.
//!
//! ```no_run
//! use md5pack::archive::{extract, store, PackOptions};
//!
//! let opts = PackOptions::default();
//! let packed = store("notes.txt", &opts)?;      // writes notes.md5pack
//! println!("{}", packed.report);
//! let restored = extract(&packed.path, &PackOptions {
//!     output_dir: Some("/tmp".into()),
//!     ..PackOptions::default()
//! })?;
//! assert_eq!(restored.path, std::path::Path::new("/tmp/notes.txt"));
//! # Ok::<(), md5pack::archive::PackError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::checksum::{digest_file, to_hex, Digest};
use crate::header::{
    name_from_bytes, name_to_bytes, ContainerHeader, FormatError, FILE_EXTENSION, FILE_NAME_LEN,
};
use crate::integrity::{check, CheckReport, IntegrityError};

/// Default copy chunk: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Permissions for files created by store and extract (rw-rw-r--).
#[cfg(unix)]
pub const OUTPUT_MODE: u32 = 0o664;

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`store`] and [`extract`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Where to place the produced file. `None` means next to the source
    /// file for `store`, and the working directory for `extract`.
    pub output_dir: Option<PathBuf>,
    pub chunk_size: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PackError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Format(FormatError),
    #[error(transparent)]
    Integrity(IntegrityError),
    #[error("'{}': {reason}", path.display())]
    Path { path: PathBuf, reason: String },
}

impl From<FormatError> for PackError {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::Io(io) => PackError::Io(io),
            other => PackError::Format(other),
        }
    }
}

impl From<IntegrityError> for PackError {
    fn from(e: IntegrityError) -> Self {
        match e {
            IntegrityError::Format(f) => f.into(),
            IntegrityError::Io(io) => PackError::Io(io),
            other => PackError::Integrity(other),
        }
    }
}

fn path_error(path: &Path, reason: &str) -> PackError {
    PackError::Path { path: path.to_owned(), reason: reason.to_owned() }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// A verified file produced by [`store`] or [`extract`].
#[derive(Debug, Clone)]
pub struct PackOutcome {
    /// The container (store) or the restored file (extract).
    pub path: PathBuf,
    /// Header of the container that was verified.
    pub report: CheckReport,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Wrap `source` into a new container and verify the result.
///
/// The source is never modified. Empty sources are refused because a
/// zero-size header is always treated as corrupt.
pub fn store<P: AsRef<Path>>(source: P, opts: &PackOptions) -> Result<PackOutcome, PackError> {
    let source = source.as_ref();
    let base_name = source
        .file_name()
        .ok_or_else(|| path_error(source, "has no file name"))?;
    info!(source = %source.display(), "storing file");

    let digest = digest_file(source)?;
    let mut src = File::open(source)?;
    let file_size = src.metadata()?.len();
    if file_size == 0 {
        return Err(FormatError::ZeroSize.into());
    }

    let header = ContainerHeader::new(&name_to_bytes(base_name), file_size, digest);
    let target = container_path(source, opts.output_dir.as_deref());
    ensure_distinct(source, &target)?;
    debug!(
        target = %target.display(),
        file_size,
        digest = %to_hex(&digest),
        payload_start = header.payload_start,
        payload_end = header.payload_end,
        "writing container"
    );

    {
        let mut out = create_output(&target)?;
        header.write(&mut out)?;
        copy_exact(&mut src, &mut out, file_size, opts.chunk_size)?;
        out.flush()?;
    }

    info!(container = %target.display(), "running integrity check");
    let report = check(&target)?;
    Ok(PackOutcome { path: target, report })
}

/// Container path for `source`: its stem plus `.md5pack`, clamped to
/// [`FILE_NAME_LEN`] bytes, inside `output_dir` or alongside the source.
pub fn container_path(source: &Path, output_dir: Option<&Path>) -> PathBuf {
    let mut name = source.file_stem().map(name_to_bytes).unwrap_or_default();
    name.truncate(FILE_NAME_LEN - FILE_EXTENSION.len() - 1);
    name.push(b'.');
    name.extend_from_slice(FILE_EXTENSION.as_bytes());
    let name = name_from_bytes(&name);

    match output_dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

// ── Extract ───────────────────────────────────────────────────────────────────

/// Verify `container`, restore its payload under the recorded file name and
/// verify the restored file against the stored digest.
///
/// Nothing is written when the container fails its integrity check.
pub fn extract<P: AsRef<Path>>(container: P, opts: &PackOptions) -> Result<PackOutcome, PackError> {
    let container = container.as_ref();
    info!(container = %container.display(), "extracting file");

    let report = check(container)?;

    let mut src = File::open(container)?;
    let header = ContainerHeader::read(&mut src)?;
    let name = plain_file_name(&header)?;
    let target = match &opts.output_dir {
        Some(dir) => dir.join(&name),
        None => PathBuf::from(&name),
    };
    ensure_distinct(container, &target)?;
    debug!(
        target = %target.display(),
        payload_start = header.payload_start,
        file_size = header.file_size,
        "copying payload"
    );

    {
        let mut out = create_output(&target)?;
        src.seek(SeekFrom::Start(u64::from(header.payload_start)))?;
        copy_exact(&mut src, &mut out, header.file_size, opts.chunk_size)?;
        out.flush()?;
    }

    verify_written(&target, &header.digest)?;

    info!(target = %target.display(), "extracted");
    Ok(PackOutcome { path: target, report })
}

/// Re-digest a file written to disk and compare it with `expected`.
fn verify_written(path: &Path, expected: &Digest) -> Result<(), PackError> {
    let written = digest_file(path)?;
    if written != *expected {
        warn!(target = %path.display(), "restored file does not match stored digest");
        return Err(IntegrityError::Mismatch { expected: *expected, actual: written }.into());
    }
    Ok(())
}

/// The recorded name as a single plain path component.
fn plain_file_name(header: &ContainerHeader) -> Result<PathBuf, PackError> {
    let name = PathBuf::from(header.file_name_os());
    let mut components = name.components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name.as_os_str()
    );
    if plain {
        Ok(name)
    } else {
        Err(path_error(&name, "recorded file name is not a plain file name"))
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn create_output(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(OUTPUT_MODE);
    }
    options.open(path)
}

/// Refuse to write over the file being read.
fn ensure_distinct(input: &Path, target: &Path) -> Result<(), PackError> {
    if let (Ok(a), Ok(b)) = (fs::canonicalize(input), fs::canonicalize(target)) {
        if a == b {
            return Err(path_error(target, "output would overwrite the input file"));
        }
    }
    Ok(())
}

/// Copy exactly `len` bytes in `chunk_size` pieces. A stream that ends early
/// is an `UnexpectedEof` error.
fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
    chunk_size: usize,
) -> io::Result<()> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("expected {len} bytes, got {}", len - remaining),
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::DIGEST_LEN;
    use std::io::Cursor;

    #[test]
    fn test_container_path_replaces_extension() {
        assert_eq!(container_path(Path::new("dir/a.txt"), None), Path::new("dir/a.md5pack"));
        assert_eq!(container_path(Path::new("a.tar.gz"), None), Path::new("a.tar.md5pack"));
    }

    #[test]
    fn test_container_path_without_extension() {
        assert_eq!(container_path(Path::new("README"), None), Path::new("README.md5pack"));
        assert_eq!(container_path(Path::new(".profile"), None), Path::new(".profile.md5pack"));
    }

    #[test]
    fn test_container_path_output_dir() {
        let p = container_path(Path::new("src/data.bin"), Some(Path::new("/tmp/out")));
        assert_eq!(p, Path::new("/tmp/out/data.md5pack"));
    }

    #[test]
    fn test_container_path_clamped() {
        let long = format!("{}.txt", "n".repeat(400));
        let p = container_path(Path::new(&long), None);
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), FILE_NAME_LEN);
        assert!(name.ends_with(".md5pack"));
    }

    #[test]
    fn test_plain_file_name_rejects_traversal() {
        let bad_names: [&[u8]; 5] = [b"../evil", b"a/b", b"..", b".", b"/etc/passwd"];
        for bad in bad_names {
            let header = ContainerHeader::new(bad, 1, [0; DIGEST_LEN]);
            assert!(matches!(plain_file_name(&header), Err(PackError::Path { .. })), "{bad:?}");
        }
        let ok = ContainerHeader::new(b"a.txt", 1, [0; DIGEST_LEN]);
        assert_eq!(plain_file_name(&ok).unwrap(), Path::new("a.txt"));
    }

    #[test]
    fn test_store_refuses_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("empty.txt");
        File::create(&src).unwrap();
        let err = store(&src, &PackOptions::default()).unwrap_err();
        assert!(matches!(err, PackError::Format(FormatError::ZeroSize)));
        assert!(!dir.path().join("empty.md5pack").exists());
    }

    #[test]
    fn test_store_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path().join("nope.txt"), &PackOptions::default()).unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
    }

    #[test]
    fn test_store_refuses_to_overwrite_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("x.md5pack");
        fs::write(&src, b"not a container").unwrap();
        let err = store(&src, &PackOptions::default()).unwrap_err();
        assert!(matches!(err, PackError::Path { .. }));
        assert_eq!(fs::read(&src).unwrap(), b"not a container");
    }

    #[test]
    fn test_verify_written_detects_changed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restored.txt");
        fs::write(&path, b"helloworld").unwrap();
        let expected = digest_file(&path).unwrap();
        verify_written(&path, &expected).unwrap();

        fs::write(&path, b"helloworlD").unwrap();
        let err = verify_written(&path, &expected).unwrap_err();
        match err {
            PackError::Integrity(IntegrityError::Mismatch { expected: e, actual }) => {
                assert_eq!(e, expected);
                assert_ne!(actual, expected);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_verify_written_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_written(&dir.path().join("gone.txt"), &[0; DIGEST_LEN]).unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
    }

    #[test]
    fn test_copy_exact_short_stream() {
        let mut out = Vec::new();
        let err = copy_exact(&mut Cursor::new(b"abc"), &mut out, 5, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_copy_exact_stops_at_len() {
        let mut out = Vec::new();
        copy_exact(&mut Cursor::new(b"abcdef"), &mut out, 4, 3).unwrap();
        assert_eq!(out, b"abcd");
    }
}

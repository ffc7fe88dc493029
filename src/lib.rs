pub mod checksum;
pub mod header;
pub mod integrity;
pub mod archive;

pub use checksum::{Digest, digest_file, digest_reader};
pub use header::{ContainerHeader, FormatError};
pub use integrity::{check, CheckReport, IntegrityError};
pub use archive::{extract, store, PackError, PackOptions, PackOutcome};

use clap::{ArgAction, ArgGroup, Parser};
use md5pack::archive::{extract, store, PackError, PackOptions};
use md5pack::integrity::check;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "md5pack",
    version = concat!("version ", env!("CARGO_PKG_VERSION")),
    about = "Wrap a single file in a container with an embedded MD5 checksum",
    disable_version_flag = true,
    arg_required_else_help = true,
    after_help = "Examples:\n  \
        md5pack -s myfile.ext            create myfile.md5pack next to myfile.ext\n  \
        md5pack -s myfile.ext -o /tmp    create /tmp/myfile.md5pack\n  \
        md5pack -e myfile.md5pack        extract the original file from the container"
)]
#[command(group(ArgGroup::new("action").required(true).args(["store", "extract", "check"])))]
struct Cli {
    /// Store FILE in a new .md5pack container
    #[arg(short = 's', long, value_name = "FILE")]
    store: Option<PathBuf>,
    /// Extract the original file from a container
    #[arg(short = 'e', long, value_name = "FILE")]
    extract: Option<PathBuf>,
    /// Check the integrity of a container
    #[arg(short = 'c', long, value_name = "FILE")]
    check: Option<PathBuf>,
    /// Directory where the result is written
    #[arg(short = 'o', long, value_name = "DIR", conflicts_with = "check")]
    output: Option<PathBuf>,
    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
    /// More log output on stderr; repeat for debug detail
    #[arg(long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let opts = PackOptions {
        output_dir: cli.output.clone(),
        ..PackOptions::default()
    };

    let result = match (&cli.store, &cli.extract, &cli.check) {
        (Some(path), _, _) => run_store(path, &opts),
        (_, Some(path), _) => run_extract(path, &opts),
        (_, _, Some(path)) => run_check(path),
        _ => unreachable!("clap requires one of --store, --extract or --check"),
    };

    match result {
        Ok(()) => {
            println!("Success!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            println!("Failed!");
            ExitCode::FAILURE
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn run_store(path: &Path, opts: &PackOptions) -> Result<(), PackError> {
    verify_paths(path, opts)?;
    println!("Storing file '{}'...", path.display());
    let packed = store(path, opts)?;
    println!("Running integrity check...");
    println!("{}", packed.report);
    println!("Created: {}", packed.path.display());
    Ok(())
}

fn run_extract(path: &Path, opts: &PackOptions) -> Result<(), PackError> {
    verify_paths(path, opts)?;
    println!("Extracting file '{}'...", path.display());
    println!("Running integrity check...");
    let restored = extract(path, opts)?;
    println!("{}", restored.report);
    println!("Extracted: {}", restored.path.display());
    Ok(())
}

fn run_check(path: &Path) -> Result<(), PackError> {
    verify_paths(path, &PackOptions::default())?;
    println!("Running integrity check for '{}'...", path.display());
    let report = check(path)?;
    println!("{report}");
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn verify_paths(input: &Path, opts: &PackOptions) -> Result<(), PackError> {
    if !input.exists() {
        return Err(PackError::Path {
            path: input.to_owned(),
            reason: "not accessible".into(),
        });
    }
    if let Some(dir) = &opts.output_dir {
        if !dir.is_dir() {
            return Err(PackError::Path {
                path: dir.clone(),
                reason: "output directory does not exist".into(),
            });
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_version_text() {
        let version = concat!("version ", env!("CARGO_PKG_VERSION"));
        assert_eq!(Cli::command().get_version(), Some(version));
        let err = Cli::try_parse_from(["md5pack", "-v"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_an_action_is_required() {
        assert!(Cli::try_parse_from(["md5pack", "--verbose"]).is_err());
        assert!(Cli::try_parse_from(["md5pack", "-s", "a", "-c", "b"]).is_err());
        assert!(Cli::try_parse_from(["md5pack", "-c", "a", "-o", "/tmp"]).is_err());
    }

    #[test]
    fn test_store_with_output_dir() {
        let cli = Cli::try_parse_from(["md5pack", "-s", "a.txt", "-o", "/tmp"]).unwrap();
        assert_eq!(cli.store.as_deref(), Some(Path::new("a.txt")));
        assert_eq!(cli.output.as_deref(), Some(Path::new("/tmp")));
        assert!(cli.extract.is_none() && cli.check.is_none());
    }
}

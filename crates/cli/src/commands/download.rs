//! download command - Download an object or a prefix
//!
//! A prefix address is downloaded recursively into the local directory.
//! A single object lands in the local directory under its base name, or at
//! the given local path.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use clap::Args;
use s3ctl_core::{Address, Error, Result};
use serde::Serialize;

use super::{Context, connect};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size};

/// Download objects
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Source address (s3://bucket/key or s3://bucket/prefix/)
    pub source: String,

    /// Local destination
    #[arg(default_value = ".")]
    pub destination: PathBuf,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    status: &'static str,
    source: String,
    destination: String,
    files: u64,
    bytes: u64,
}

/// Execute the download command
pub async fn execute(args: DownloadArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let source = match s3ctl_core::resolve(&args.source) {
        Ok(source) => source,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    let result = if source.is_prefix {
        session
            .bulk(ctx)
            .download_directory(&source.bucket, &source.key, &args.destination)
            .await
            .map(|summary| (summary.files, summary.bytes, args.destination.clone()))
    } else {
        match object_destination(&source, &args.destination) {
            Ok(dest) => session
                .engine(ctx)
                .get_file(&source.bucket, &source.key, &dest)
                .await
                .map(|bytes| (1, bytes, dest)),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok((files, bytes, destination)) => {
            if formatter.is_json() {
                formatter.json(&DownloadOutput {
                    status: "success",
                    source: source.to_string(),
                    destination: destination.display().to_string(),
                    files,
                    bytes,
                });
            } else {
                formatter.success(&format!(
                    "Downloaded {files} file(s), {} to {}",
                    format_size(bytes as i64),
                    destination.display()
                ));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

/// Local file path for a single-object download
fn object_destination(source: &Address, local: &Path) -> Result<PathBuf> {
    let into_directory = local.is_dir() || ends_with_separator(local);
    if !into_directory {
        return Ok(local.to_path_buf());
    }

    let name = source.base_name();
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!(
            "cannot derive a local file name from '{source}'"
        )));
    }
    Ok(local.join(name))
}

fn ends_with_separator(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DownloadArgs,
    }

    #[test]
    fn test_destination_defaults_to_current_dir() {
        let cli = TestCli::try_parse_from(["download", "s3://b/k"]).unwrap();
        assert_eq!(cli.args.destination, PathBuf::from("."));
    }

    #[test]
    fn test_object_into_existing_directory() {
        let dir = TempDir::new().unwrap();
        let source = s3ctl_core::resolve("s3://b/docs/report.pdf").unwrap();
        assert_eq!(
            object_destination(&source, dir.path()).unwrap(),
            dir.path().join("report.pdf")
        );
    }

    #[test]
    fn test_object_into_trailing_separator() {
        let source = s3ctl_core::resolve("s3://b/docs/report.pdf").unwrap();
        assert_eq!(
            object_destination(&source, Path::new("out/")).unwrap(),
            Path::new("out/").join("report.pdf")
        );
    }

    #[test]
    fn test_object_to_explicit_file() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("renamed.pdf");
        let source = s3ctl_core::resolve("s3://b/docs/report.pdf").unwrap();
        assert_eq!(object_destination(&source, &local).unwrap(), local);
    }
}

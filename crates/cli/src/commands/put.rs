//! put command - Upload a file or a directory tree
//!
//! A directory source is uploaded recursively below the destination key.
//! A file uploaded to a prefix destination keeps its base name.

use std::path::{Path, PathBuf};

use clap::Args;
use s3ctl_core::{Address, Error, Result};
use serde::Serialize;

use super::{Context, connect};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size};

/// Upload local files
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file or directory
    pub source: PathBuf,

    /// Destination address (s3://bucket/key or s3://bucket/prefix/)
    pub target: String,

    /// Make the uploaded objects publicly readable
    #[arg(short = 'p', long)]
    pub public: bool,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    status: &'static str,
    source: String,
    target: String,
    files: u64,
    bytes: u64,
}

/// Execute the put command
pub async fn execute(args: PutArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let target = match s3ctl_core::resolve(&args.target) {
        Ok(target) => target,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    let result = if args.source.is_dir() {
        session
            .bulk(ctx)
            .upload_directory(&target.bucket, &args.source, &target.key, args.public)
            .await
            .map(|summary| (summary.files, summary.bytes, target.to_string()))
    } else {
        match file_key(&args.source, &target) {
            Ok(key) => session
                .engine(ctx)
                .put_file(&args.source, &target.bucket, &key, args.public)
                .await
                .map(|bytes| (1, bytes, target.uri_for(&key))),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok((files, bytes, destination)) => {
            if formatter.is_json() {
                formatter.json(&PutOutput {
                    status: "success",
                    source: args.source.display().to_string(),
                    target: destination,
                    files,
                    bytes,
                });
            } else {
                formatter.success(&format!(
                    "Uploaded {files} file(s), {} to {destination}",
                    format_size(bytes as i64)
                ));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

/// Object key for a single file upload
fn file_key(source: &Path, target: &Address) -> Result<String> {
    if !target.is_prefix {
        return Ok(target.key.clone());
    }

    let name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "'{}' has no usable file name for the object key",
                source.display()
            ))
        })?;
    Ok(target.object_key_for(name))
}

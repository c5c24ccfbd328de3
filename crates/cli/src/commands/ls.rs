//! ls command - List buckets and objects
//!
//! Lists buckets when no address is given, or the entries below a bucket or
//! prefix. Entries are printed as they arrive from the paginated listing.

use std::sync::Arc;

use clap::Args;
use jiff::Timestamp;
use s3ctl_core::{Address, BucketInfo, ListRequest, ListingEntry, Result, StorageBackend};
use serde::Serialize;

use super::{Context, connect};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_date, format_size};

/// List buckets or objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote address (s3://bucket[/prefix]); omit to list buckets
    pub address: Option<String>,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Show prefixes (folders) only
    #[arg(short = 'f', long = "folders")]
    pub folders_only: bool,

    /// Print full s3:// paths instead of paths relative to the listed prefix
    #[arg(short = 'p', long)]
    pub full_path: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<LsItem>,
}

#[derive(Debug, Serialize)]
struct LsItem {
    key: String,
    path: String,
    is_dir: bool,
    size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
struct BucketsOutput {
    buckets: Vec<BucketInfo>,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let address = match args.address.as_deref().map(s3ctl_core::resolve).transpose() {
        Ok(address) => address,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    let result = match address {
        None => list_buckets(session.backend.as_ref(), &formatter).await,
        Some(address) => {
            let request = ListRequest::new(&address.bucket, &address.key)
                .recursive(args.recursive)
                .folders_only(args.folders_only)
                .page_limit(session.defaults.page_size);
            list_entries(&session.backend, request, &address, &args, ctx, &formatter).await
        }
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => formatter.fail(&e),
    }
}

async fn list_buckets(backend: &dyn StorageBackend, formatter: &Formatter) -> Result<()> {
    let buckets = backend.list_buckets().await?;

    if formatter.is_json() {
        formatter.json(&BucketsOutput { buckets });
    } else {
        for bucket in &buckets {
            formatter.println(&bucket_line(&bucket.name));
        }
    }
    Ok(())
}

async fn list_entries(
    backend: &Arc<dyn StorageBackend>,
    request: ListRequest,
    address: &Address,
    args: &LsArgs,
    ctx: &Context,
    formatter: &Formatter,
) -> Result<()> {
    let mut listing = s3ctl_core::list(Arc::clone(backend), request, ctx.cancel.clone());
    let mut items = Vec::new();

    while let Some(entry) = listing.next_entry().await {
        let entry = entry?;
        if is_listed_prefix(&entry, &address.key) {
            continue;
        }

        let path = display_path(address, &entry.key, args.full_path);
        if formatter.is_json() {
            items.push(LsItem {
                is_dir: entry.is_prefix_marker,
                size_bytes: entry.size,
                last_modified: entry.last_modified,
                key: entry.key,
                path,
            });
        } else {
            formatter.println(&entry_line(&entry, &path));
        }
    }

    if formatter.is_json() {
        formatter.json(&LsOutput { items });
    }
    Ok(())
}

/// The listing of `dir/` reports `dir/` itself when a marker object exists
fn is_listed_prefix(entry: &ListingEntry, prefix: &str) -> bool {
    entry.key == prefix && entry.key.ends_with('/')
}

fn display_path(address: &Address, key: &str, full_path: bool) -> String {
    let uri = address.uri_for(key);
    if full_path {
        return uri;
    }
    let base = address.display_prefix();
    uri.strip_prefix(&base).map(str::to_string).unwrap_or(uri)
}

fn entry_line(entry: &ListingEntry, path: &str) -> String {
    if entry.is_prefix_marker {
        format!("{:<22} {:<11} {path}", "", "DIR")
    } else {
        format!(
            "{:<22} {:<11} {path}",
            format_date(entry.last_modified),
            format_size(entry.size)
        )
    }
}

fn bucket_line(name: &str) -> String {
    format!("{:<22} {:<11} s3://{name}/", "", "BUCKET")
}

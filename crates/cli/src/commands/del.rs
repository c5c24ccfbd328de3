//! del command - Delete an object or a prefix
//!
//! A prefix address deletes every object below it. Deleting from a bucket
//! root removes the whole bucket content and requires --force.

use clap::Args;
use s3ctl_core::{Address, BulkSummary, Error, Result};
use serde::Serialize;

use super::{Context, Session, connect};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Delete objects
#[derive(Args, Debug)]
pub struct DelArgs {
    /// Address to delete (s3://bucket/key or s3://bucket/prefix/)
    pub target: String,

    /// Allow deleting every object in a bucket
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct DelOutput {
    status: &'static str,
    target: String,
    deleted: u64,
}

/// Execute the del command
pub async fn execute(args: DelArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let target = match s3ctl_core::resolve(&args.target).and_then(|t| check_target(t, args.force)) {
        Ok(target) => target,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    match delete(&session, ctx, &target).await {
        Ok(summary) => {
            if formatter.is_json() {
                formatter.json(&DelOutput {
                    status: "success",
                    target: target.to_string(),
                    deleted: summary.files,
                });
            } else {
                formatter.success(&format!("Deleted {} object(s) from {target}", summary.files));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

async fn delete(session: &Session, ctx: &Context, target: &Address) -> Result<BulkSummary> {
    if target.is_prefix {
        return session
            .bulk(ctx)
            .delete_directory(&target.bucket, &target.key)
            .await;
    }

    // Deleting a missing key succeeds on S3; report it as not found
    session.backend.stat_object(&target.bucket, &target.key).await?;
    session
        .backend
        .remove_object(&target.bucket, &target.key)
        .await?;
    tracing::debug!(bucket = %target.bucket, key = %target.key, "deleted object");
    Ok(BulkSummary { files: 1, bytes: 0 })
}

fn check_target(target: Address, force: bool) -> Result<Address> {
    if target.is_bucket_root() && !force {
        return Err(Error::InvalidArgument(format!(
            "refusing to delete everything in {target}; pass --force to confirm"
        )));
    }
    Ok(target)
}

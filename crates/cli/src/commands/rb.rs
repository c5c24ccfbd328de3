//! rb command - Remove bucket
//!
//! Removes an empty bucket. A bucket that still holds objects is left in
//! place and reported; that outcome is informational.

use clap::Args;
use s3ctl_core::RemoveBucketOutcome;
use serde::Serialize;

use super::{Context, connect};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove a bucket
#[derive(Args, Debug)]
pub struct RbArgs {
    /// Bucket address (s3://bucket)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct RbOutput {
    status: RemoveBucketOutcome,
    bucket: String,
}

/// Execute the rb command
pub async fn execute(args: RbArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let bucket = match s3ctl_core::resolve_bucket(&args.target) {
        Ok(bucket) => bucket,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    match session.bulk(ctx).remove_bucket(&bucket).await {
        Ok(status) => {
            if formatter.is_json() {
                formatter.json(&RbOutput { status, bucket });
            } else {
                match status {
                    RemoveBucketOutcome::Removed => {
                        formatter.success(&format!("Bucket 's3://{bucket}' removed."))
                    }
                    RemoveBucketOutcome::NotEmpty => formatter.warning(&format!(
                        "Bucket 's3://{bucket}' is not empty; delete its objects first."
                    )),
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

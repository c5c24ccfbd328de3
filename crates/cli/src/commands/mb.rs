//! mb command - Make bucket
//!
//! Creates a bucket. An existing bucket is reported, not treated as an error.

use clap::Args;
use s3ctl_core::MakeBucketOutcome;
use serde::Serialize;

use super::{Context, connect};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket address (s3://bucket)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    status: MakeBucketOutcome,
    bucket: String,
}

/// Execute the mb command
pub async fn execute(args: MbArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let bucket = match s3ctl_core::resolve_bucket(&args.target) {
        Ok(bucket) => bucket,
        Err(e) => return formatter.fail(&e),
    };

    let session = match connect(ctx).await {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    match session.bulk(ctx).make_bucket(&bucket).await {
        Ok(status) => {
            if formatter.is_json() {
                formatter.json(&MbOutput { status, bucket });
            } else {
                match status {
                    MakeBucketOutcome::Created => {
                        formatter.success(&format!("Bucket 's3://{bucket}' created."))
                    }
                    MakeBucketOutcome::AlreadyExists => {
                        formatter.warning(&format!("Bucket 's3://{bucket}' already exists."))
                    }
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_serializes_outcome() {
        let output = MbOutput {
            status: MakeBucketOutcome::AlreadyExists,
            bucket: "data".into(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "already_exists");
        assert_eq!(json["bucket"], "data");
    }
}

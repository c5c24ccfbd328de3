//! url command - Generate a presigned download URL

use std::time::Duration;

use clap::Args;
use s3ctl_core::{Address, Error, Result, SignatureVersion};
use serde::Serialize;

use super::{Context, connect_with};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Generate a presigned URL for an object
#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Object address (s3://bucket/key)
    pub target: String,

    /// How long the URL stays valid (e.g. 30m, 24h, 7d)
    #[arg(short = 'e', long, default_value = "24h", value_parser = humantime::parse_duration)]
    pub expiry: Duration,

    /// Sign the URL with signature version 2
    #[arg(short = '2', long)]
    pub v2: bool,
}

#[derive(Debug, Serialize)]
struct UrlOutput {
    target: String,
    url: String,
    expires_in_secs: u64,
}

/// Execute the url command
pub async fn execute(args: UrlArgs, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let target = match check_request(&args) {
        Ok(target) => target,
        Err(e) => return formatter.fail(&e),
    };

    let signature = presign_signature(&args);
    let session = match connect_with(ctx, |backend| match signature {
        Some(signature) => backend.with_presign_signature(signature),
        None => backend,
    })
    .await
    {
        Ok(session) => session,
        Err(e) => return formatter.fail(&e),
    };

    match session
        .engine(ctx)
        .presign_get(&target.bucket, &target.key, args.expiry)
        .await
    {
        Ok(url) => {
            if formatter.is_json() {
                formatter.json(&UrlOutput {
                    target: target.to_string(),
                    url,
                    expires_in_secs: args.expiry.as_secs(),
                });
            } else {
                // Printed in quiet mode too
                println!("{url}");
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

/// Signature forced by the command line; `None` keeps the profile's
fn presign_signature(args: &UrlArgs) -> Option<SignatureVersion> {
    args.v2.then_some(SignatureVersion::V2)
}

fn check_request(args: &UrlArgs) -> Result<Address> {
    let target = s3ctl_core::resolve(&args.target)?;
    if target.is_prefix {
        return Err(Error::InvalidAddress(format!(
            "'{target}' is a prefix; presigned URLs need an object key"
        )));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: UrlArgs,
    }

    fn parse(argv: &[&str]) -> UrlArgs {
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_default_expiry() {
        let args = parse(&["url", "s3://b/k"]);
        assert_eq!(args.expiry, Duration::from_secs(24 * 3600));
        assert!(!args.v2);
    }

    #[test]
    fn test_humantime_expiry() {
        let args = parse(&["url", "s3://b/k", "-e", "90m"]);
        assert_eq!(args.expiry, Duration::from_secs(90 * 60));
        assert!(TestCli::try_parse_from(["url", "s3://b/k", "-e", "soon"]).is_err());
    }

    #[test]
    fn test_v2_flag_selects_signature() {
        let args = parse(&["url", "s3://b/k"]);
        assert_eq!(presign_signature(&args), None);

        for flag in ["--v2", "-2"] {
            let args = parse(&["url", "s3://b/k", flag]);
            assert_eq!(presign_signature(&args), Some(SignatureVersion::V2));
            assert_eq!(check_request(&args).unwrap().key, "k");
        }
    }

    #[test]
    fn test_prefix_is_rejected() {
        let args = parse(&["url", "s3://b/dir/"]);
        assert!(matches!(check_request(&args), Err(Error::InvalidAddress(_))));

        let args = parse(&["url", "s3://b/dir/k"]);
        assert_eq!(check_request(&args).unwrap().key, "dir/k");
    }
}

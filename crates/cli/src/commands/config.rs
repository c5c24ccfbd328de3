//! Configuration commands
//!
//! Profiles are named connection settings (endpoint, credentials, signature
//! version) stored in the configuration file.

use clap::Subcommand;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use s3ctl_core::{Profile, ProfileManager, Result, SignatureVersion};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter configuration file with example profiles
    Init,

    /// Show the configuration file location and all profiles
    List,

    /// Select the profile used by default
    Use(UseArgs),
}

/// Arguments for the `config use` command
#[derive(clap::Args, Debug)]
pub struct UseArgs {
    /// Profile name
    pub name: String,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    path: String,
    created: bool,
}

#[derive(Debug, Serialize)]
struct ProfileInfo {
    name: String,
    endpoint: String,
    access_key_id: String,
    secret_access_key: String,
    use_ssl: bool,
    signature: SignatureVersion,
    region: String,
    current: bool,
}

impl ProfileInfo {
    fn new(profile: &Profile, current: Option<&str>) -> Self {
        Self {
            name: profile.name.clone(),
            endpoint: profile.endpoint.clone(),
            access_key_id: profile.access_key_id.clone(),
            secret_access_key: profile.masked_secret(),
            use_ssl: profile.use_ssl,
            signature: profile.signature,
            region: profile.region.clone(),
            current: current == Some(profile.name.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListOutput {
    path: String,
    current: Option<String>,
    profiles: Vec<ProfileInfo>,
}

#[derive(Debug, Serialize)]
struct UseOutput {
    current: String,
}

/// Execute a config subcommand
pub fn execute(cmd: ConfigCommands, ctx: &Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let result = ProfileManager::new().and_then(|profiles| match cmd {
        ConfigCommands::Init => init(&profiles, &formatter),
        ConfigCommands::List => list(&profiles, &formatter),
        ConfigCommands::Use(args) => use_profile(&profiles, &args.name, &formatter),
    });

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => formatter.fail(&e),
    }
}

fn init(profiles: &ProfileManager, formatter: &Formatter) -> Result<()> {
    let config = profiles.config_manager();
    let created = config.init_default()?;
    let path = config.config_path().display().to_string();

    if formatter.is_json() {
        formatter.json(&InitOutput { path, created });
    } else if created {
        formatter.success(&format!(
            "Created {path}. Edit it to add your endpoint and credentials."
        ));
    } else {
        formatter.warning(&format!("{path} already exists; leaving it unchanged."));
    }
    Ok(())
}

fn list(profiles: &ProfileManager, formatter: &Formatter) -> Result<()> {
    let path = profiles.config_manager().config_path().display().to_string();
    let current = profiles.current_name()?;
    let infos: Vec<ProfileInfo> = profiles
        .list()?
        .iter()
        .map(|p| ProfileInfo::new(p, current.as_deref()))
        .collect();

    if formatter.is_json() {
        formatter.json(&ListOutput {
            path,
            current,
            profiles: infos,
        });
        return Ok(());
    }

    formatter.println(&format!("Configuration file: {path}"));
    match infos.iter().find(|p| p.current) {
        Some(p) => formatter.println(&format!(
            "Current profile: {} ({}, key {}, secret {})",
            p.name, p.endpoint, p.access_key_id, p.secret_access_key
        )),
        None => formatter.println("Current profile: (none)"),
    }

    if infos.is_empty() {
        formatter.println("No profiles configured. Run 's3ctl config init' to create some.");
    } else {
        formatter.println(&profile_table(&infos).to_string());
    }
    Ok(())
}

fn use_profile(profiles: &ProfileManager, name: &str, formatter: &Formatter) -> Result<()> {
    profiles.use_profile(name)?;

    if formatter.is_json() {
        formatter.json(&UseOutput {
            current: name.to_string(),
        });
    } else {
        formatter.success(&format!("Now using profile '{name}'."));
    }
    Ok(())
}

fn profile_table(infos: &[ProfileInfo]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "", "Name", "Endpoint", "Access Key", "Secret", "SSL", "Signature", "Region",
        ]);

    for p in infos {
        table.add_row(vec![
            if p.current { "*" } else { "" }.to_string(),
            p.name.clone(),
            p.endpoint.clone(),
            p.access_key_id.clone(),
            p.secret_access_key.clone(),
            p.use_ssl.to_string(),
            p.signature.to_string(),
            p.region.clone(),
        ]);
    }
    table
}

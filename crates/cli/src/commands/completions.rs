//! completions command - Print a shell completion script
//!
//! Profile names found in the configuration file when the script is
//! generated are offered for `--profile` and `config use`.

use clap::CommandFactory;
use clap::builder::PossibleValuesParser;
use clap_complete::Shell;
use s3ctl_core::ProfileManager;

use super::Cli;
use crate::exit_code::ExitCode;

/// Arguments for the completions command
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Print the completion script for `args.shell` to stdout
pub fn execute(args: CompletionsArgs) -> ExitCode {
    let mut cmd = completion_command(&configured_profiles());
    let bin = cmd.get_name().to_string();
    clap_complete::generate(args.shell, &mut cmd, bin, &mut std::io::stdout());
    ExitCode::Success
}

fn configured_profiles() -> Vec<String> {
    match ProfileManager::new().and_then(|profiles| profiles.list()) {
        Ok(profiles) => profiles.into_iter().map(|p| p.name).collect(),
        Err(e) => {
            tracing::debug!("completing without profile names: {e}");
            Vec::new()
        }
    }
}

/// The CLI definition with profile arguments restricted to `profiles`
///
/// Only used to render the script; parsing keeps accepting any name.
fn completion_command(profiles: &[String]) -> clap::Command {
    let cmd = Cli::command();
    if profiles.is_empty() {
        return cmd;
    }

    let names = || PossibleValuesParser::new(profiles.to_vec());
    cmd.mut_arg("profile", |arg| arg.value_parser(names()))
        .mut_subcommand("config", |config| {
            config.mut_subcommand("use", |use_cmd| {
                use_cmd.mut_arg("name", |arg| arg.value_parser(names()))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["work".to_string(), "home".to_string()]
    }

    fn script(shell: Shell, profiles: &[String]) -> String {
        let mut cmd = completion_command(profiles);
        let mut buf = Vec::new();
        clap_complete::generate(shell, &mut cmd, "s3ctl", &mut buf);
        String::from_utf8(buf).unwrap()
    }

    fn possible_values(arg: &clap::Arg) -> Vec<String> {
        arg.get_possible_values()
            .iter()
            .map(|v| v.get_name().to_string())
            .collect()
    }

    #[test]
    fn test_profile_names_for_config_use() {
        let cmd = completion_command(&names());
        let use_cmd = cmd
            .find_subcommand("config")
            .and_then(|config| config.find_subcommand("use"))
            .unwrap();
        let arg = use_cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "name")
            .unwrap();
        assert_eq!(possible_values(arg), names());
    }

    #[test]
    fn test_profile_names_for_profile_flag() {
        let cmd = completion_command(&names());
        let arg = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "profile")
            .unwrap();
        assert_eq!(possible_values(arg), names());

        let zsh = script(Shell::Zsh, &names());
        assert!(zsh.contains("(work home)"));
    }

    #[test]
    fn test_no_profiles_leaves_names_free() {
        let cmd = completion_command(&[]);
        let arg = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "profile")
            .unwrap();
        assert!(arg.get_possible_values().is_empty());
    }

    #[test]
    fn test_script_lists_subcommands() {
        let bash = script(Shell::Bash, &[]);
        for sub in ["ls", "put", "download", "del", "mb", "rb", "url", "config"] {
            assert!(bash.contains(sub), "missing {sub}");
        }
    }
}

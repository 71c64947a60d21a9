//! Command-line argument parsing and processing.
//!
//! Parsing is done by clap; the result is reduced to a single [`CliAction`]
//! so the main function only has to dispatch.

use clap::Parser;
use clap::error::ErrorKind;

/// Raw command-line flags.
#[derive(Debug, Parser)]
#[command(
    name = "backlight_manager",
    version,
    about = "Manage screen backlight brightness, optionally following an ambient light sensor"
)]
pub struct Cli {
    /// Enable ambient mode (toggles it on a running daemon)
    #[arg(short, long)]
    pub ambient: bool,

    /// Run in the background as the single daemon instance
    #[arg(short, long)]
    pub daemon: bool,

    /// Terminate the running daemon
    #[arg(short, long)]
    pub kill: bool,

    /// Print the configuration and daemon status
    #[arg(short, long)]
    pub print_status: bool,

    /// Change brightness by PERCENT of the maximum (may be negative)
    #[arg(short, long, value_name = "PERCENT", allow_negative_numbers = true)]
    pub set: Option<i32>,
}

/// What the invocation should do.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Adjust brightness, toggle ambient mode and/or start the daemon
    Run {
        ambient: bool,
        daemon: bool,
        adjustment: i32,
    },
    /// Terminate the running daemon
    Kill,
    /// Print configuration and daemon status
    PrintStatus,
    /// Help or version text was requested; print it and exit successfully
    ShowInfo(String),
    /// Unknown option or bad value; print the message and exit with failure
    ShowError(String),
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments, including the program name.
    ///
    /// `--kill` takes precedence over `--print-status`, which takes
    /// precedence over everything else.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        let action = match Cli::try_parse_from(args) {
            Ok(cli) => Self::action_for(cli),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    CliAction::ShowInfo(e.render().to_string())
                }
                _ => CliAction::ShowError(e.render().to_string()),
            },
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args_os())
    }

    fn action_for(cli: Cli) -> CliAction {
        if cli.kill {
            CliAction::Kill
        } else if cli.print_status {
            CliAction::PrintStatus
        } else {
            CliAction::Run {
                ambient: cli.ambient,
                daemon: cli.daemon,
                adjustment: cli.set.unwrap_or(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ambient: bool, daemon: bool, adjustment: i32) -> CliAction {
        CliAction::Run {
            ambient,
            daemon,
            adjustment,
        }
    }

    #[test]
    fn test_parse_no_args() {
        let parsed = ParsedArgs::parse(["backlight_manager"]);
        assert_eq!(parsed.action, run(false, false, 0));
    }

    #[test]
    fn test_parse_set_positive_and_negative() {
        let parsed = ParsedArgs::parse(["backlight_manager", "--set", "25"]);
        assert_eq!(parsed.action, run(false, false, 25));

        let parsed = ParsedArgs::parse(["backlight_manager", "-s", "-10"]);
        assert_eq!(parsed.action, run(false, false, -10));
    }

    #[test]
    fn test_parse_set_requires_number() {
        let parsed = ParsedArgs::parse(["backlight_manager", "--set", "lots"]);
        assert!(matches!(parsed.action, CliAction::ShowError(_)));

        let parsed = ParsedArgs::parse(["backlight_manager", "--set"]);
        assert!(matches!(parsed.action, CliAction::ShowError(_)));
    }

    #[test]
    fn test_parse_ambient_daemon_combined_short_flags() {
        let parsed = ParsedArgs::parse(["backlight_manager", "-ad"]);
        assert_eq!(parsed.action, run(true, true, 0));
    }

    #[test]
    fn test_parse_daemon_with_adjustment() {
        let parsed =
            ParsedArgs::parse(["backlight_manager", "--daemon", "--set", "5", "--ambient"]);
        assert_eq!(parsed.action, run(true, true, 5));
    }

    #[test]
    fn test_parse_kill_takes_precedence() {
        let parsed = ParsedArgs::parse(["backlight_manager", "--print-status", "--kill", "-a"]);
        assert_eq!(parsed.action, CliAction::Kill);
    }

    #[test]
    fn test_parse_print_status() {
        let parsed = ParsedArgs::parse(["backlight_manager", "-p"]);
        assert_eq!(parsed.action, CliAction::PrintStatus);
    }

    #[test]
    fn test_parse_help_flag() {
        for flag in ["--help", "-h"] {
            let parsed = ParsedArgs::parse(["backlight_manager", flag]);
            match parsed.action {
                CliAction::ShowInfo(text) => assert!(text.contains("--ambient")),
                other => panic!("expected help, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_version_flag() {
        let parsed = ParsedArgs::parse(["backlight_manager", "--version"]);
        assert!(matches!(parsed.action, CliAction::ShowInfo(_)));
    }

    #[test]
    fn test_parse_unknown_flag() {
        let parsed = ParsedArgs::parse(["backlight_manager", "--brighter"]);
        assert!(matches!(parsed.action, CliAction::ShowError(_)));
    }
}

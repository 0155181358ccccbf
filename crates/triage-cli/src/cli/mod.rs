use clap::Parser;

pub mod global;
pub mod root_commands;
pub mod subcommands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `triage` binary.
#[derive(Debug, Parser)]
#[command(
    name = "triage",
    version,
    about = "Triage - bug classification queue and result cache"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root holding `.triage/` (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            limit: self.limit,
            project: self.project.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::subcommands::{JobsCommands, StatusArg};
    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommand() {
        let cli = Cli::try_parse_from(["triage", "--format", "raw", "models", "--verbose"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn table_format_is_not_offered() {
        assert!(Cli::try_parse_from(["triage", "--format", "table", "models"]).is_err());
    }

    #[test]
    fn jobs_list_parses_status_filter() {
        let cli = Cli::try_parse_from(["triage", "jobs", "list", "--status", "running", "-l", "5"])
            .expect("cli should parse");
        assert_eq!(cli.limit, Some(5));
        let Commands::Jobs {
            action: JobsCommands::List { status },
        } = cli.command
        else {
            panic!("expected jobs list");
        };
        assert_eq!(status, Some(StatusArg::Running));
    }

    #[test]
    fn classify_requires_entities() {
        assert!(Cli::try_parse_from(["triage", "classify", "component"]).is_err());
        let cli = Cli::try_parse_from(["triage", "classify", "component", "123=t1", "456"])
            .expect("cli should parse");
        let Commands::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.entities, vec!["123=t1", "456"]);
        assert!(!args.batch);
    }

    #[test]
    fn project_flag_is_copied_into_global_flags() {
        let cli = Cli::try_parse_from(["triage", "--project", "/tmp/demo", "cache", "purge"])
            .expect("cli should parse");
        assert_eq!(cli.global_flags().project.as_deref(), Some("/tmp/demo"));
    }
}

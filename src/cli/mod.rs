//! CLI module for Magi
//!
//! Commands:
//! - `run`: send a prompt to a provider and stream its answer
//! - `exec`: stream any interactive command through the runner
//! - `slots`: inspect and clean the slot database

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::providers::ProviderKind;
use crate::settings::{load_config, validate_config};

mod exec;
mod output;
mod run;
mod slots;

pub use output::Printer;

/// Magi CLI
#[derive(Parser, Debug)]
#[command(name = "magi")]
#[command(about = "Run interactive AI coding CLIs as clean event streams")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print events as JSON lines instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a prompt to a provider
    Run {
        #[arg(value_enum)]
        provider: ProviderKind,
        prompt: String,
        /// Working directory of the provider process
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Run an arbitrary interactive command
    Exec {
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Inspect the slot database
    #[command(subcommand)]
    Slots(SlotsCommand),
}

#[derive(Subcommand, Debug)]
pub enum SlotsCommand {
    /// List leases
    List {
        /// Only leases of this resource class
        #[arg(long)]
        class: Option<String>,
    },
    /// Delete leases whose heartbeat is stale
    Purge,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let printer = Printer::new(cli.json);
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config()?;
    validate_config(&config)?;

    match command {
        Commands::Run {
            provider,
            prompt,
            cwd,
        } => run::run(&config, provider, &prompt, cwd, printer).await,
        Commands::Exec { cwd, command } => exec::run(&config, command, cwd, printer).await,
        Commands::Slots(SlotsCommand::List { class }) => {
            slots::list(&config, class.as_deref(), &printer).await
        }
        Commands::Slots(SlotsCommand::Purge) => slots::purge(&config, &printer).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["magi", "--json", "run", "claude-code", "fix the tests"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Some(Commands::Run { provider, prompt, cwd }) => {
                assert_eq!(provider, ProviderKind::ClaudeCode);
                assert_eq!(prompt, "fix the tests");
                assert!(cwd.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_exec_trailing_args() {
        let cli = Cli::try_parse_from(["magi", "exec", "--cwd", "/tmp", "--", "python3", "-i", "-q"]).unwrap();
        match cli.command {
            Some(Commands::Exec { cwd, command }) => {
                assert_eq!(cwd, Some(PathBuf::from("/tmp")));
                assert_eq!(command, vec!["python3", "-i", "-q"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_slots() {
        let cli = Cli::try_parse_from(["magi", "slots", "list", "--class", "codex"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Slots(SlotsCommand::List { class: Some(ref c) })) if c == "codex"
        ));
        assert!(Cli::try_parse_from(["magi", "exec"]).is_err());
    }
}

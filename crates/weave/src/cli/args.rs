use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Replays agent conversation recordings through the Weave reducer.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Feed a JSON Lines recording through a session and print the result
    Replay {
        /// Recording file, one `messages`, `agent_state` or `local_echo` record per line
        file: PathBuf,

        /// Session id to replay into (a new one is generated if omitted)
        #[arg(long, env = "WEAVE_SESSION")]
        session: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Manage store preferences
    Preferences {
        #[command(subcommand)]
        action: PreferencesCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum PreferencesCommands {
    /// Print the preferences file location
    Path,
    /// Show the effective preferences
    Show,
    /// Overwrite the preferences file with the defaults
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed snapshot JSON
    Json,
    /// Indented outline with sidechains nested under their Task
    Outline,
}

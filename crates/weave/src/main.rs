use clap::Parser;
use eyre::Result;

use weave::cli::{Cli, Commands, PreferencesCommands};
use weave::commands::Command;
use weave::commands::preferences::{PreferencesAction, PreferencesCommand};
use weave::commands::replay::ReplayCommand;
use weave_session::StorePreferences;

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    weave::cli::config::load_env()?;

    // Initialize tracing (level configured via RUST_LOG env var)
    weave::utils::tracing::init_tracing()?;

    let command: Box<dyn Command> = match cli.command {
        Commands::Replay {
            file,
            session,
            format,
        } => Box::new(ReplayCommand {
            file,
            session,
            format,
            preferences: StorePreferences::load().unwrap_or_default(),
        }),
        Commands::Preferences { action } => Box::new(PreferencesCommand {
            action: match action {
                PreferencesCommands::Path => PreferencesAction::Path,
                PreferencesCommands::Show => PreferencesAction::Show,
                PreferencesCommands::Reset => PreferencesAction::Reset,
            },
        }),
    };

    command.execute().await
}

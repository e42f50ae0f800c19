use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use eyre::Result;
use weave_session::{SessionId, SessionManager, SessionSnapshot, StorePreferences};

use super::Command;
use crate::cli::OutputFormat;
use crate::error::Error;
use crate::recording::{read_recording, replay};
use crate::render::render_outline;

pub struct ReplayCommand {
    pub file: PathBuf,
    pub session: Option<String>,
    pub format: OutputFormat,
    pub preferences: StorePreferences,
}

#[async_trait]
impl Command for ReplayCommand {
    async fn execute(&self) -> Result<()> {
        let snapshot = self.run().await?;

        let mut stdout = std::io::stdout();
        match self.format {
            OutputFormat::Json => {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&snapshot)?)?;
            }
            OutputFormat::Outline => write!(stdout, "{}", render_outline(&snapshot))?,
        }
        Ok(())
    }
}

impl ReplayCommand {
    /// Replays the recording into a fresh session and returns its snapshot.
    pub async fn run(&self) -> std::result::Result<SessionSnapshot, Error> {
        let session_id = match &self.session {
            Some(raw) => raw
                .parse::<SessionId>()
                .map_err(|_| Error::SessionId(raw.clone()))?,
            None => SessionId::new(),
        };

        let entries = read_recording(&self.file)?;
        tracing::info!(
            session_id = %session_id,
            path = %self.file.display(),
            entries = entries.len(),
            "Replaying recording"
        );

        let mut manager = SessionManager::new(self.preferences.clone().into())?;
        let handle = manager.get_or_create(session_id)?;
        let result = replay(&handle, entries).await;
        manager.shutdown_all();
        result
    }
}

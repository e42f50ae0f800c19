use std::io::Write;

use async_trait::async_trait;
use eyre::Result;
use weave_session::StorePreferences;

use super::Command;
use crate::error::Error;

pub struct PreferencesCommand {
    pub action: PreferencesAction,
}

pub enum PreferencesAction {
    Path,
    Show,
    Reset,
}

#[async_trait]
impl Command for PreferencesCommand {
    async fn execute(&self) -> Result<()> {
        match &self.action {
            PreferencesAction::Path => self.path().map_err(Into::into),
            PreferencesAction::Show => self.show().map_err(Into::into),
            PreferencesAction::Reset => self.reset().map_err(Into::into),
        }
    }
}

impl PreferencesCommand {
    fn path(&self) -> std::result::Result<(), Error> {
        let path = StorePreferences::config_path()?;
        writeln!(std::io::stdout(), "{}", path.display())?;
        Ok(())
    }

    fn show(&self) -> std::result::Result<(), Error> {
        let prefs = StorePreferences::load()?;
        let path = StorePreferences::config_path()?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "Preferences file: {}", path.display())?;
        writeln!(stdout, "\n{}", toml::to_string_pretty(&prefs)?)?;
        Ok(())
    }

    fn reset(&self) -> std::result::Result<(), Error> {
        StorePreferences::default().save()?;
        let path = StorePreferences::config_path()?;
        writeln!(std::io::stdout(), "Preferences reset to defaults at {}", path.display())?;
        Ok(())
    }
}

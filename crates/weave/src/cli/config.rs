use eyre::Result;

/// Loads `.env` from the working directory or its parents. A missing file is
/// not an error; a malformed one is.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base dockhand config directory (~/.config/dockhand/ on Unix, %APPDATA%\dockhand on Windows)
pub fn dockhand() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("dockhand"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("dockhand"))
    }
}

/// Global dockhand.json config file path
pub fn dockhand_json() -> Result<PathBuf> {
    Ok(dockhand()?.join("dockhand.json"))
}

/// Per-run log directory
pub fn logs() -> Result<PathBuf> {
    Ok(dockhand()?.join("logs"))
}

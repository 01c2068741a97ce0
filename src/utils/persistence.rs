use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::LedgerError;

/// Writes `value` as pretty JSON, staging to a temporary file and renaming over `path`.
pub fn save_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json)?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Loads a JSON document from disk, returning structured errors on failure.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LedgerError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

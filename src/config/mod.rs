use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    currency::{CurrencyCode, FormatOptions, LocaleConfig},
    errors::{LedgerError, Result},
    recurring::MAX_CATCH_UP_PERIODS,
    utils::persistence::{load_json, save_json_atomic},
};

const APP_DIR: &str = "fintrack";
const CONFIG_FILE: &str = "config.json";

/// Engine settings: display preferences plus scheduler limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub format: FormatOptions,
    /// Upper bound on postings a single scheduler pass makes for one rule.
    #[serde(default = "EngineConfig::default_max_catch_up")]
    pub max_catch_up_periods: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: LocaleConfig::default(),
            currency: CurrencyCode::default(),
            format: FormatOptions::default(),
            max_catch_up_periods: MAX_CATCH_UP_PERIODS,
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    fn default_max_catch_up() -> usize {
        MAX_CATCH_UP_PERIODS
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_catch_up_periods == 0 {
            return Err(LedgerError::Validation(
                "max_catch_up_periods must be at least 1".into(),
            ));
        }
        if self.locale.decimal_separator == self.locale.grouping_separator {
            return Err(LedgerError::Validation(
                "decimal and grouping separators must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Loads and saves [`EngineConfig`] as JSON at a fixed path.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Uses `<config dir>/fintrack/config.json`, falling back to the working directory.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_path(base.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns defaults when no file exists yet.
    pub fn load(&self) -> Result<EngineConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file; using defaults");
            return Ok(EngineConfig::default());
        }
        let config: EngineConfig = load_json(&self.path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        save_json_atomic(config, &self.path)?;
        tracing::info!(path = %self.path.display(), "config saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

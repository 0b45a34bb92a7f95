mod schema;
mod validation;

pub use schema::{RankingSettings, ScoringSettings, Settings, StorageSettings};
pub use validation::validate_settings;

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the config directory path (~/.config/readrank/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("readrank"))
}

/// Get the default config file path (~/.config/readrank/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Default state snapshot path (<data dir>/readrank/state.json)
pub fn default_snapshot_path() -> Result<PathBuf> {
    let data = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data.join("readrank").join("state.json"))
}

/// Load settings from a YAML file.
///
/// With no explicit path, a missing default file yields the defaults. An
/// explicit path must exist.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given file does not exist
/// - The file cannot be read
/// - The YAML cannot be parsed or has unknown fields
pub fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let explicit = path.is_some();
    let config_path = match path {
        Some(p) => p,
        None => get_config_path()?,
    };

    if !config_path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", config_path.display());
        }
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_saphyr::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config: invalid YAML in {}",
            config_path.display()
        )
    })?;

    Ok(settings)
}

/// Snapshot path from settings, falling back to the data directory.
pub fn snapshot_path(settings: &Settings) -> Result<PathBuf> {
    match &settings.storage.snapshot_path {
        Some(p) => Ok(p.clone()),
        None => default_snapshot_path(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "ranking:\n  deadline: \"1s\"\n").unwrap();

        let settings = load_settings(Some(path)).unwrap();
        assert_eq!(settings.ranking.deadline().unwrap(), Duration::from_secs(1));
        assert_eq!(settings.ranking.read_retries, 2);
        assert_eq!(settings.ranking.key_prefix, "leaderboard:cmp:");
        assert_eq!(settings.scoring.max_minutes_per_event, 1440);
        assert!(settings.storage.snapshot_path.is_none());
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = load_settings(Some(dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "ranking:\n  deadlien: \"1s\"\n").unwrap();
        assert!(load_settings(Some(path)).is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "").unwrap();
        assert_eq!(load_settings(Some(path)).unwrap(), Settings::default());
    }

    #[test]
    fn test_snapshot_path_override() {
        let mut settings = Settings::default();
        settings.storage.snapshot_path = Some(PathBuf::from("/tmp/rr.json"));
        assert_eq!(snapshot_path(&settings).unwrap(), PathBuf::from("/tmp/rr.json"));
    }
}

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV_VAR: &str = "KANJIYOMI_CONFIG";

/// Tunable constants of the progression engine
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base of the level curve: `floor(level_base_xp * level^1.5)`
    pub level_base_xp: u32,
    pub xp_per_correct: u32,
    pub score_per_correct: u32,
    pub session_length: u32,
    pub streak_lookback_days: u32,
    pub daily_goal: u32,
    pub daily_bonus_xp: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level_base_xp: 50,
            xp_per_correct: 15,
            score_per_correct: 10,
            session_length: 10,
            streak_lookback_days: 30,
            daily_goal: 20,
            daily_bonus_xp: 50,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.level_base_xp == 0 {
            return Err(AppError::ConfigError(
                "level_base_xp must be greater than zero".to_string(),
            ));
        }
        if self.session_length == 0 {
            return Err(AppError::ConfigError(
                "session_length must be greater than zero".to_string(),
            ));
        }
        if self.streak_lookback_days == 0 {
            return Err(AppError::ConfigError(
                "streak_lookback_days must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_config_path() -> Result<PathBuf, AppError> {
    // 1. 環境変数 KANJIYOMI_CONFIG を最優先に従う
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = path.trim();
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // 2. 設定ディレクトリ
    let config_dir = dirs::config_dir().ok_or(AppError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "Config directory not found",
    )))?;
    Ok(config_dir.join("kanjiyomi").join("config.toml"))
}

/// Load the engine config, falling back to defaults when no file exists
pub fn load_config() -> Result<EngineConfig, AppError> {
    let config_path = get_config_path()?;
    load_config_from(&config_path)
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, AppError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let config: EngineConfig = toml::from_str(&contents)
        .map_err(|e| AppError::ConfigError(format!("Failed to parse config: {}", e)))?;
    config.validate()?;

    Ok(config)
}

pub fn save_config(config: &EngineConfig) -> Result<(), AppError> {
    let config_path = get_config_path()?;
    save_config_to(config, &config_path)
}

pub fn save_config_to(config: &EngineConfig, path: &Path) -> Result<(), AppError> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string(config)
        .map_err(|e| AppError::ConfigError(format!("Failed to serialize config: {}", e)))?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(toml_string.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("level_base_xp = 50"));
        assert!(toml.contains("xp_per_correct = 15"));
    }

    #[test]
    fn test_config_partial_deserialization() {
        let toml_str = "level_base_xp = 100\ndaily_goal = 30";
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.level_base_xp, 100);
        assert_eq!(config.daily_goal, 30);
        assert_eq!(config.score_per_correct, 10);
    }

    #[test]
    fn test_validate_rejects_zero_base() {
        let config = EngineConfig {
            level_base_xp: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let config = EngineConfig {
            xp_per_correct: 20,
            ..Default::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "session_length = 0").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_env_var_takes_priority() {
        use std::env;
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "daily_bonus_xp = 75").unwrap();
        let original_env = env::var(CONFIG_ENV_VAR).ok();

        unsafe {
            env::set_var(CONFIG_ENV_VAR, &path);
        }
        let result = load_config().unwrap();
        assert_eq!(result.daily_bonus_xp, 75);

        unsafe {
            if let Some(val) = original_env {
                env::set_var(CONFIG_ENV_VAR, val);
            } else {
                env::remove_var(CONFIG_ENV_VAR);
            }
        }
    }
}

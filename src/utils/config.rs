use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::Settings;

const ENV_PROXY_PORT: &str = "GIDIT_PROXY_PORT";
const ENV_DATA_DIR: &str = "GIDIT_DATA_DIR";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn init_logging(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// `GIDIT_DATA_DIR` wins over the platform app data directory.
pub fn resolve_data_dir(platform_dir: PathBuf) -> PathBuf {
    data_dir_override(platform_dir, |key| std::env::var(key).ok())
}

fn data_dir_override(platform_dir: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(ENV_DATA_DIR)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(platform_dir)
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config").join("settings.json")
}

pub fn apply_env_defaults(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup(ENV_PROXY_PORT) {
        match raw.trim().parse::<u16>() {
            Ok(port) => settings.proxy.port = port,
            Err(_) => log::warn!("Ignoring invalid {}={:?}", ENV_PROXY_PORT, raw),
        }
    }
}

/// Read settings with environment overrides applied.
pub fn load_settings(data_dir: &Path) -> Result<Settings> {
    let mut settings = read_settings(data_dir)?;
    apply_env_defaults(&mut settings);
    Ok(settings)
}

/// Read the settings file as stored, writing the defaults first if it does
/// not exist yet. Environment overrides are not applied.
pub fn read_settings(data_dir: &Path) -> Result<Settings> {
    let path = settings_path(data_dir);

    let settings = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str::<Settings>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        let settings = Settings::default();
        save_settings(data_dir, &settings)?;
        settings
    };

    Ok(settings)
}

pub fn save_settings(data_dir: &Path, settings: &Settings) -> Result<()> {
    let path = settings_path(data_dir);
    if let Some(config_dir) = path.parent() {
        std::fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

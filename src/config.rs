use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "slskd-search";
const CONFIG_FILE_NAME: &str = "config.json";
const PORTABLE_ENV: &str = "SLSKD_SEARCH_PORTABLE";

/// Connection and polling settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub url_base: String,
    pub api_key: String,
    pub token: String,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
    pub timeout_s: f64,
    pub search_auto_update: bool,
    pub search_interval_sec: u64,
    pub search_timeout_ms: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:5030".to_string(),
            url_base: "/".to_string(),
            api_key: String::new(),
            token: String::new(),
            username: String::new(),
            password: String::new(),
            verify_ssl: false,
            timeout_s: 15.0,
            search_auto_update: true,
            search_interval_sec: 2,
            search_timeout_ms: 1_800_000,
        }
    }
}

impl AppConfig {
    /// Copy with credentials blanked, safe to log.
    pub fn sanitized(&self) -> Self {
        Self {
            api_key: String::new(),
            token: String::new(),
            password: String::new(),
            ..self.clone()
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
            || !self.token.is_empty()
            || (!self.username.is_empty() && !self.password.is_empty())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn portable_dir(cwd: &Path) -> Option<PathBuf> {
    if std::env::var(PORTABLE_ENV).is_ok_and(|v| is_truthy(&v)) {
        return Some(cwd.to_path_buf());
    }
    if cwd.join(".portable").exists() || cwd.join(CONFIG_FILE_NAME).exists() {
        return Some(cwd.to_path_buf());
    }
    None
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().or_else(dirs::home_dir)
}

fn resolve_config_path(
    portable: Option<PathBuf>,
    user_dir: Option<PathBuf>,
    cwd: PathBuf,
) -> PathBuf {
    if let Some(dir) = portable {
        return dir.join(CONFIG_FILE_NAME);
    }
    user_dir
        .unwrap_or(cwd)
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Resolves where `config.json` lives: the working directory in portable
/// mode, otherwise the platform config directory.
pub fn config_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(resolve_config_path(portable_dir(&cwd), user_config_dir(), cwd))
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save_config_to(path: &Path, cfg: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(cfg)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

pub fn save_config(cfg: &AppConfig) -> Result<()> {
    save_config_to(&config_path()?, cfg)
}

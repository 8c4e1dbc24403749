use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

const APP_DIR: &str = ".VisaPal";
const CONFIG_FILE: &str = "config.json";
const REMOTE_API_KEY_ENV: &str = "VISAPAL_REMOTE_API_KEY";
pub const DEFAULT_IDENTITY_HEADER: &str = "x-forwarded-email";
pub const MIN_REMOTE_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Sqlite,
    Remote,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Remote => "remote",
        })
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" | "local" => Ok(Self::Sqlite),
            "remote" | "hosted" => Ok(Self::Remote),
            other => bail!("store must be memory|sqlite|remote, got {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub report_dir: PathBuf,
    pub api_port: u16,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    pub remote_table: String,
    pub remote_timeout_seconds: u64,
    pub admin_emails: Vec<String>,
    pub identity_header: String,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            store: StoreKind::Sqlite,
            db_path: root.join("db").join("leads.db"),
            report_dir: default_report_dir(),
            api_port: 8787,
            remote_url: None,
            remote_api_key: None,
            remote_table: "leads".to_string(),
            remote_timeout_seconds: 20,
            admin_emails: Vec::new(),
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if self.store == StoreKind::Sqlite {
            if let Some(parent) = self.db_path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create DB directory: {}", parent.display())
                })?;
            }
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.display()
            )
        })
    }

    pub fn resolve_remote_api_key(&self) -> Option<String> {
        std::env::var(REMOTE_API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.remote_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "store" => {
                self.store = value.parse()?;
            }
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "report_dir" => {
                self.report_dir = expand_home(value.trim());
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "remote_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                if trimmed.is_empty() {
                    self.remote_url = None;
                } else {
                    Url::parse(trimmed)
                        .with_context(|| format!("remote_url is not a valid URL: {trimmed}"))?;
                    self.remote_url = Some(trimmed.to_string());
                }
            }
            "remote_api_key" => {
                self.remote_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "remote_table" => {
                let table = value.trim();
                if table.is_empty() {
                    bail!("remote_table cannot be empty");
                }
                self.remote_table = table.to_string();
            }
            "remote_timeout_seconds" => {
                let seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("remote_timeout_seconds must be a number"))?;
                if seconds < MIN_REMOTE_TIMEOUT_SECONDS {
                    bail!("remote_timeout_seconds must be at least {MIN_REMOTE_TIMEOUT_SECONDS}");
                }
                self.remote_timeout_seconds = seconds;
            }
            "admin_emails" => {
                self.admin_emails = value
                    .split(',')
                    .map(|part| part.trim().to_lowercase())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>();
            }
            "identity_header" => {
                let header = value.trim().to_lowercase();
                http::HeaderName::from_bytes(header.as_bytes())
                    .map_err(|_| anyhow!("identity_header is not a valid header name: {header}"))?;
                self.identity_header = header;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: store|store.kind, db_path|db.path, report_dir|report.dir, api_port|api.port, remote_url|remote.url, remote_api_key|remote.api_key, remote_table|remote.table, remote_timeout_seconds|remote.timeout_seconds, admin_emails|admin.emails, identity_header|admin.identity_header"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "store" => Some(self.store.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "remote_url" => Some(
                self.remote_url
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "remote_api_key" => Some(
                self.remote_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "remote_table" => Some(self.remote_table.clone()),
            "remote_timeout_seconds" => Some(self.remote_timeout_seconds.to_string()),
            "admin_emails" => Some(self.admin_emails.join(",")),
            "identity_header" => Some(self.identity_header.clone()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "store" | "store.kind" => "store",
        "db_path" | "db.path" => "db_path",
        "report_dir" | "report.dir" => "report_dir",
        "api_port" | "api.port" => "api_port",
        "remote_url" | "remote.url" => "remote_url",
        "remote_api_key" | "remote.api_key" => "remote_api_key",
        "remote_table" | "remote.table" => "remote_table",
        "remote_timeout_seconds" | "remote.timeout_seconds" => "remote_timeout_seconds",
        "admin_emails" | "admin.emails" => "admin_emails",
        "identity_header" | "admin.identity_header" => "identity_header",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("VisaPal")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

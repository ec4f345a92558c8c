/// Settings — loaded once at startup from a JSON file.
///
/// ```json
/// {
///   "bot_token": "123456:ABC...",
///   "admin_user_id": 123456789,
///   "folder_paths": ["/srv/inbox", "/home/me/Downloads"],
///   "check_interval_secs": 300
/// }
/// ```
///
/// Every field except `bot_token`, `admin_user_id` and `folder_paths` has a
/// default. Unknown keys (such as the `api_id` / `api_hash` pair found in
/// older settings files) are ignored.
use crate::archive::{MediaSet, DEFAULT_MEDIA_EXTENSIONS};
use crate::model::UserId;
use crate::scanner::{DetectorOptions, DEFAULT_CHECK_INTERVAL, DEFAULT_LISTING_TIMEOUT};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Default upper bound for one outbound send.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub bot_token: String,
    pub admin_user_id: UserId,
    pub folder_paths: Vec<PathBuf>,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub advance_on_send_failure: bool,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"<redacted>")
            .field("admin_user_id", &self.admin_user_id)
            .field("folder_paths", &self.folder_paths)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("transfer_timeout_secs", &self.transfer_timeout_secs)
            .field("listing_timeout_secs", &self.listing_timeout_secs)
            .field("advance_on_send_failure", &self.advance_on_send_failure)
            .field("work_dir", &self.work_dir)
            .field("media_extensions", &self.media_extensions)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_secs()
}

fn default_transfer_timeout_secs() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT.as_secs()
}

fn default_listing_timeout_secs() -> u64 {
    DEFAULT_LISTING_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_media_extensions() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

impl Settings {
    /// Read, parse and validate a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid("bot_token must not be empty".into()));
        }
        if self.folder_paths.is_empty() {
            return Err(ConfigError::Invalid(
                "folder_paths must list at least one folder".into(),
            ));
        }
        let mut seen = HashSet::new();
        for folder in &self.folder_paths {
            if !folder.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "folder path must be absolute: {}",
                    folder.display()
                )));
            }
            if !seen.insert(folder) {
                return Err(ConfigError::Invalid(format!(
                    "folder listed twice: {}",
                    folder.display()
                )));
            }
        }
        for (name, secs) in [
            ("check_interval_secs", self.check_interval_secs),
            ("transfer_timeout_secs", self.transfer_timeout_secs),
            ("listing_timeout_secs", self.listing_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            listing_timeout: Duration::from_secs(self.listing_timeout_secs),
            advance_on_send_failure: self.advance_on_send_failure,
        }
    }

    /// Where transient archives are written; the system temp dir by default.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn media_set(&self) -> MediaSet {
        MediaSet::new(&self.media_extensions)
    }
}

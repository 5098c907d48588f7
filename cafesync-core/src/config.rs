use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "cafesync.toml";

/// Top-level cafesync configuration, matching `cafesync.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CafeConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub geocoder: GeocoderSection,
    #[serde(default)]
    pub paths: PathsSection,
}

impl CafeConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML (used by `init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.page_size == 0 {
            return Err(ConfigError::Invalid(
                "source.page_size must be greater than zero".into(),
            ));
        }
        if self.source.host.trim().is_empty() {
            return Err(ConfigError::Invalid("source.host must not be empty".into()));
        }
        if self.llm.provider != "gemini" {
            return Err(ConfigError::Invalid(format!(
                "llm.provider must be \"gemini\", got \"{}\"",
                self.llm.provider
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// Paginated social-media source (Instagram Graph API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub host: String,
    pub api_version: String,
    /// Literal account id; when empty, read from `user_id_env`.
    pub user_id: String,
    pub user_id_env: String,
    pub access_token_env: String,
    pub fields: String,
    pub page_size: u32,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            host: "graph.instagram.com".to_string(),
            api_version: "v23.0".to_string(),
            user_id: String::new(),
            user_id_env: "INSTAGRAM_USER_ID".to_string(),
            access_token_env: "INSTAGRAM_ACCESS_TOKEN".to_string(),
            fields: "id,caption,media_type,media_url,permalink,timestamp,username,like_count,comments_count,media_product_type".to_string(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Only `gemini` is supported.
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: f64,
    /// Minimum spacing between consecutive extraction calls.
    pub min_interval_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GOOGLE_AI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.0,
            min_interval_ms: 7000,
        }
    }
}

impl LlmSection {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderSection {
    pub endpoint: String,
    pub min_interval_ms: u64,
}

impl Default for GeocoderSection {
    fn default() -> Self {
        Self {
            endpoint: "https://msearch.gsi.go.jp/address-search/AddressSearch".to_string(),
            min_interval_ms: 500,
        }
    }
}

impl GeocoderSection {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Locations of the persisted files, relative to `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub data_dir: PathBuf,
    pub posts_file: String,
    pub stores_file: String,
    pub skipped_file: String,
    pub refresh_log_file: String,
    pub export_stem: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            posts_file: "instagram_posts.json".to_string(),
            stores_file: "cafe_data_kv.json".to_string(),
            skipped_file: "skipped_posts.json".to_string(),
            refresh_log_file: "update_media_urls.log".to_string(),
            export_stem: "cafe_data".to_string(),
        }
    }
}

impl PathsSection {
    pub fn posts_path(&self) -> PathBuf {
        self.data_dir.join(&self.posts_file)
    }

    pub fn stores_path(&self) -> PathBuf {
        self.data_dir.join(&self.stores_file)
    }

    pub fn skipped_path(&self) -> PathBuf {
        self.data_dir.join(&self.skipped_file)
    }

    pub fn refresh_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.refresh_log_file)
    }
}

/// Secrets resolved from the environment at startup.
///
/// `Debug` is hand-written so tokens never reach a log line.
#[derive(Clone)]
pub struct SourceCredentials {
    pub user_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl SourceCredentials {
    /// Resolve the account id and access token named by `section`.
    pub fn from_env(section: &SourceSection) -> Result<Self, ConfigError> {
        Self::resolve(section, |key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary lookup, so tests need not touch the
    /// process environment.
    pub fn resolve(
        section: &SourceSection,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let user_id = if section.user_id.trim().is_empty() {
            require(&section.user_id_env, &lookup)?
        } else {
            section.user_id.trim().to_string()
        };
        let access_token = require(&section.access_token_env, &lookup)?;
        Ok(Self {
            user_id,
            access_token,
        })
    }
}

/// Resolve the LLM API key named by `section.api_key_env`.
pub fn llm_api_key(
    section: &LlmSection,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    require(&section.api_key_env, &lookup)
}

fn require(key: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingSecret(key.to_string())),
    }
}

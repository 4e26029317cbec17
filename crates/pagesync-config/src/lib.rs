//! Configuration management for pagesync.
//!
//! Parses `pagesync.toml` with serde and discovers it in the current directory
//! or its parents. CLI settings are applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String values under `[confluence]` and `[confluence.auth]`, and
//! `sync.notice_message`, support:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override dry run.
    pub dry_run: Option<bool>,
    /// Override orphan deletion.
    pub delete_orphans: Option<bool>,
    /// Override worker count.
    pub workers: Option<usize>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "pagesync.toml";

/// Default identity store location, relative to the config file.
const DEFAULT_STATE_FILE: &str = ".pagesync/state.json";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Confluence connection and target.
    pub confluence: Option<ConfluenceConfig>,
    /// Sync behavior.
    pub sync: SyncSettings,

    /// Identity store path resolved against the config directory (set after loading).
    #[serde(skip)]
    pub state_path: PathBuf,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Confluence configuration.
#[derive(Debug, Deserialize)]
pub struct ConfluenceConfig {
    /// Confluence server base URL.
    pub base_url: String,
    /// Space that pages are created in.
    pub space_key: String,
    /// Page that top-level documents are created under.
    pub root_page_id: String,
    /// Optional title prefix for every page.
    #[serde(default)]
    pub root_page_name: Option<String>,
    /// Simulate every mutating call.
    #[serde(default)]
    pub dry_run: bool,
    /// Credentials.
    pub auth: AuthConfig,
}

/// Credentials, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// HTTP Basic with an account email and API token.
    Basic { email: String, api_token: String },
    /// Bearer access token.
    #[serde(rename = "oauth2")]
    OAuth2 { access_token: String },
    /// Atlassian Connect JWT.
    Jwt {
        issuer: String,
        secret: String,
        #[serde(default = "default_jwt_expiry")]
        expiry_seconds: u64,
    },
}

fn default_jwt_expiry() -> u64 {
    180
}

/// `[sync]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Rewrite fenced code blocks into the code macro.
    pub code_blocks: bool,
    /// Delete pages whose documents disappeared.
    pub delete_orphans: bool,
    /// Concurrent document operations.
    pub workers: usize,
    /// Identity store location.
    pub state_file: String,
    /// Notice prepended to every page.
    pub notice_message: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            code_blocks: true,
            delete_orphans: false,
            workers: 4,
            state_file: DEFAULT_STATE_FILE.to_owned(),
            notice_message: None,
        }
    }
}

impl ConfluenceConfig {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is empty or has invalid format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.base_url, "confluence.base_url")?;
        require_http_url(&self.base_url, "confluence.base_url")?;
        require_non_empty(&self.space_key, "confluence.space_key")?;
        require_non_empty(&self.root_page_id, "confluence.root_page_id")?;
        match &self.auth {
            AuthConfig::Basic { email, api_token } => {
                require_non_empty(email, "confluence.auth.email")?;
                require_non_empty(api_token, "confluence.auth.api_token")?;
            }
            AuthConfig::OAuth2 { access_token } => {
                require_non_empty(access_token, "confluence.auth.access_token")?;
            }
            AuthConfig::Jwt {
                issuer,
                secret,
                expiry_seconds,
            } => {
                require_non_empty(issuer, "confluence.auth.issuer")?;
                require_non_empty(secret, "confluence.auth.secret")?;
                if *expiry_seconds == 0 {
                    return Err(ConfigError::Validation(
                        "confluence.auth.expiry_seconds must be greater than 0".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for (key, value) in self.expandable_fields() {
            expand_in_place(key, value)?;
        }
        Ok(())
    }

    /// String fields that accept `${VAR}` references, keyed by config path.
    fn expandable_fields(&mut self) -> Vec<(&'static str, &mut String)> {
        let mut fields = vec![
            ("confluence.base_url", &mut self.base_url),
            ("confluence.space_key", &mut self.space_key),
            ("confluence.root_page_id", &mut self.root_page_id),
        ];
        if let Some(name) = &mut self.root_page_name {
            fields.push(("confluence.root_page_name", name));
        }
        match &mut self.auth {
            AuthConfig::Basic { email, api_token } => {
                fields.push(("confluence.auth.email", email));
                fields.push(("confluence.auth.api_token", api_token));
            }
            AuthConfig::OAuth2 { access_token } => {
                fields.push(("confluence.auth.access_token", access_token));
            }
            AuthConfig::Jwt { issuer, secret, .. } => {
                fields.push(("confluence.auth.issuer", issuer));
                fields.push(("confluence.auth.secret", secret));
            }
        }
        fields
    }
}

/// Replace `${VAR}` and `${VAR:-default}` references in `value`.
fn expand_in_place(key: &str, value: &mut String) -> Result<(), ConfigError> {
    if !value.contains("${") {
        return Ok(());
    }
    let expanded = shellexpand::env_with_context(value.as_str(), |name| {
        std::env::var(name).map(Some)
    })
    .map_err(|e| ConfigError::EnvVar {
        field: key.to_owned(),
        var: e.var_name,
    })?
    .into_owned();
    *value = expanded;
    Ok(())
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// A `${VAR}` reference names an unset variable.
    #[error("Environment variable {var} referenced by {field} is not set")]
    EnvVar {
        /// Config key (e.g., "`confluence.auth.access_token`").
        field: String,
        /// Variable name.
        var: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `pagesync.toml` in the current directory and its parents, falling
    /// back to defaults. CLI settings are applied last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// a value is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            let cwd = std::env::current_dir().unwrap_or_default();
            Self::default_with_base(&cwd)
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Get validated Confluence configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_confluence(&self) -> Result<&ConfluenceConfig, ConfigError> {
        let conf = self.confluence.as_ref().ok_or_else(|| {
            ConfigError::Validation("[confluence] section required in config".into())
        })?;
        conf.validate()?;
        Ok(conf)
    }

    /// Validate values that do not depend on the `[confluence]` section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.workers == 0 {
            return Err(ConfigError::Validation(
                "sync.workers must be at least 1".to_owned(),
            ));
        }
        require_non_empty(&self.sync.state_file, "sync.state_file")
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(dry_run) = settings.dry_run
            && let Some(confluence) = &mut self.confluence
        {
            confluence.dry_run = dry_run;
        }
        if let Some(delete_orphans) = settings.delete_orphans {
            self.sync.delete_orphans = delete_orphans;
        }
        if let Some(workers) = settings.workers {
            self.sync.workers = workers;
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            state_path: base.join(DEFAULT_STATE_FILE),
            ..Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        if let Some(confluence) = &mut config.confluence {
            confluence.expand_env_vars()?;
        }
        if let Some(notice) = &mut config.sync.notice_message {
            expand_in_place("sync.notice_message", notice)?;
        }

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.state_path = config_dir.join(&config.sync.state_file);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }
}

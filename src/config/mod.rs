use crate::error::{M365Error, Result};
use crate::output::OutputFormat;
use crate::util::access_token::AccessToken;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variables that override the cached session
pub const ENV_GRAPH_TOKEN: &str = "M365_GRAPH_TOKEN";
pub const ENV_SPO_TOKEN: &str = "M365_SPO_TOKEN";
pub const ENV_SPO_URL: &str = "M365_SPO_URL";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Tenant root SharePoint URL, e.g. `https://contoso.sharepoint.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spo_url: Option<String>,

    /// Output format used when `--output` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
}

/// Resource an access token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Graph,
    SharePoint,
}

impl Resource {
    pub fn cache_name(&self) -> &'static str {
        match self {
            Resource::Graph => "graph",
            Resource::SharePoint => "sharepoint",
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            Resource::Graph => ENV_GRAPH_TOKEN,
            Resource::SharePoint => ENV_SPO_TOKEN,
        }
    }
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tenant_id: Option<String>,
}

impl TokenCache {
    /// Cache entry with expiry and tenant read from the token claims
    pub fn from_token(access_token: String) -> Result<Self> {
        let claims = AccessToken::parse(&access_token)?;
        Ok(Self {
            expires_at: claims.expires_at(),
            tenant_id: claims.tenant_id().map(String::from),
            access_token,
        })
    }
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "m365ctl", "m365ctl").ok_or_else(|| {
            M365Error::ConfigError("Failed to determine config directory".into())
        })?;

        Self::with_dir(project_dirs.config_dir())
    }

    /// Manager rooted at an explicit directory
    pub fn with_dir(dir: &Path) -> Result<Self> {
        let config_dir = dir.to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn token_cache_file(&self, resource: Resource) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", resource.cache_name()))
    }

    /// Load main config
    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save main config
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)
            .map_err(|e| M365Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    /// Save token cache
    pub fn save_token(&self, resource: Resource, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(resource), contents)?;
        Ok(())
    }

    /// Load token cache, `None` when nothing is cached
    pub fn load_token(&self, resource: Resource) -> Result<Option<TokenCache>> {
        let token_path = self.token_cache_file(resource);

        if !token_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(token_path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Delete token cache
    pub fn delete_token(&self, resource: Resource) -> Result<()> {
        let token_path = self.token_cache_file(resource);

        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

/// Tokens and SharePoint URL in effect for one invocation
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub graph_token: Option<String>,
    pub spo_token: Option<String>,
    pub spo_url: Option<String>,
}

impl Session {
    /// Cached values overridden by `M365_*` environment variables
    pub fn load(config: &ConfigManager) -> Result<Self> {
        Self::load_with_env(config, |name| std::env::var(name).ok())
    }

    /// Same as `load` with an injectable environment lookup
    pub fn load_with_env(
        config: &ConfigManager,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let token = |resource: Resource| -> Result<Option<String>> {
            if let Some(token) = lookup(resource.env_var()) {
                return Ok(Some(token));
            }
            Ok(config.load_token(resource)?.map(|t| t.access_token))
        };

        Ok(Self {
            graph_token: token(Resource::Graph)?,
            spo_token: token(Resource::SharePoint)?,
            spo_url: lookup(ENV_SPO_URL).or(config.load_config()?.spo_url),
        })
    }

    /// Token for a resource, rejected when missing or expired
    pub fn token(&self, resource: Resource) -> Result<&str> {
        let token = match resource {
            Resource::Graph => self.graph_token.as_deref(),
            Resource::SharePoint => self.spo_token.as_deref(),
        }
        .ok_or_else(|| M365Error::TokenNotFound(resource.cache_name().into()))?;

        if let Ok(claims) = AccessToken::parse(token) {
            if claims.is_expired() {
                return Err(M365Error::AuthError(format!(
                    "The {} access token has expired",
                    resource.cache_name()
                )));
            }
        }
        Ok(token)
    }

    pub fn spo_url(&self) -> Result<&str> {
        self.spo_url.as_deref().ok_or_else(|| {
            M365Error::ConfigError(
                "SharePoint URL not set. Run 'm365ctl session set --spo-url <url>' or set M365_SPO_URL".into(),
            )
        })
    }
}

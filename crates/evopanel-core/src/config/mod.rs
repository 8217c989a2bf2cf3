mod defaults;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::PanelError;
use defaults::*;

/// Top-level panel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// HTTP API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Maximum request body. Sized for a ~1 MB image sent as base64.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Allowed CORS origin (the frontend URL). Empty = any origin.
    #[serde(default)]
    pub cors_origin: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            body_limit_bytes: default_body_limit(),
            cors_origin: String::new(),
        }
    }
}

/// Login tokens and the static integration token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: u64,
    /// Static bearer token accepted by the send routes. Empty = disabled.
    #[serde(default)]
    pub panel_token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_ttl_hours: default_jwt_ttl_hours(),
            panel_token: String::new(),
        }
    }
}

/// Evolution API endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

/// SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Bulk-send pacing bounds, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl DispatchConfig {
    /// Resolve a requested pacing delay.
    ///
    /// Missing or zero requests use the default. Requests under the floor also
    /// resolve to the default, not to the floor. Requests over the ceiling clamp
    /// to the ceiling.
    pub fn clamp_delay(&self, requested: Option<u64>) -> u64 {
        match requested {
            None | Some(0) => self.default_delay_ms,
            Some(d) if d < self.min_delay_ms => self.default_delay_ms,
            Some(d) if d > self.max_delay_ms => self.max_delay_ms,
            Some(d) => d,
        }
    }
}

impl Config {
    /// Overlay non-empty environment values onto the loaded file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EVOLUTION_API_URL") {
            self.evolution.base_url = v;
        }
        if let Some(v) = get("EVOLUTION_API_KEY") {
            self.evolution.api_key = v;
        }
        if let Some(v) = get("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = get("PAINEL_API_TOKEN") {
            self.auth.panel_token = v;
        }
        if let Some(v) = get("FRONTEND_URL") {
            self.api.cors_origin = v;
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.api.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value: {v}"),
            }
        }
    }

    /// Check invariants that the server relies on before it starts.
    pub fn validate(&self) -> Result<(), PanelError> {
        let d = &self.dispatch;
        if d.min_delay_ms > d.max_delay_ms {
            return Err(PanelError::Config(format!(
                "dispatch.min_delay_ms ({}) exceeds dispatch.max_delay_ms ({})",
                d.min_delay_ms, d.max_delay_ms
            )));
        }
        if d.default_delay_ms < d.min_delay_ms || d.default_delay_ms > d.max_delay_ms {
            return Err(PanelError::Config(format!(
                "dispatch.default_delay_ms ({}) must lie within [{}, {}]",
                d.default_delay_ms, d.min_delay_ms, d.max_delay_ms
            )));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(PanelError::Config(
                "auth.jwt_secret is empty. Set it in config.toml or the JWT_SECRET env var."
                    .into(),
            ));
        }
        if self.evolution.base_url.trim().is_empty() {
            return Err(PanelError::Config(
                "evolution.base_url is empty. Set it in config.toml or the EVOLUTION_API_URL env var."
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment overrides
/// are not applied here; callers decide when to layer them.
pub fn load(path: &str) -> Result<Config, PanelError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| PanelError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| PanelError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub email: EmailConfig,

    pub observability: ObservabilityConfig,

    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/loyalty.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Base URL of the web client, used to build links in outgoing email.
    pub frontend_url: String,

    /// Honour `X-Forwarded-For` when identifying clients for rate limiting.
    /// Enable only behind a reverse proxy that overwrites the header.
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            frontend_url: "http://localhost:5173".to_string(),
            trust_forwarded_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens.
    pub jwt_secret: String,

    pub token_ttl_hours: i64,

    pub reset_token_ttl_days: i64,

    /// Minimum seconds between password reset requests from one client.
    pub reset_cooldown_seconds: u64,

    /// Accounts must use an address in this domain.
    pub email_domain: String,

    /// OAuth client id that Google ID tokens must be issued for.
    /// Google sign-in is disabled when empty.
    pub google_client_id: String,

    pub google_tokeninfo_url: String,

    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            reset_token_ttl_days: 7,
            reset_cooldown_seconds: 60,
            email_domain: "mail.utoronto.ca".to_string(),
            google_client_id: String::new(),
            google_tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Provider endpoint accepting `{from, to, subject, text, html}` JSON.
    pub api_url: String,

    /// Outgoing mail is only logged when no key is configured.
    pub api_key: String,

    pub from_address: String,

    pub request_timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            from_address: "Campus Loyalty <no-reply@loyalty.example.edu>".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "campus-loyalty".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

/// Superuser account ensured on startup so a fresh database is administrable.
/// The password has no default and must satisfy the password policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub enabled: bool,

    pub superuser_utorid: String,

    pub superuser_email: String,

    pub superuser_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            superuser_utorid: "admin001".to_string(),
            superuser_email: "admin001@mail.utoronto.ca".to_string(),
            superuser_password: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            observability: ObservabilityConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found and applies environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.general.database_url, "DATABASE_URL");
        set(&mut self.auth.jwt_secret, "JWT_SECRET");
        set(&mut self.server.frontend_url, "FRONTEND_URL");
        set(&mut self.email.api_key, "EMAIL_API_KEY");
        set(&mut self.auth.google_client_id, "GOOGLE_CLIENT_ID");
        set(&mut self.bootstrap.superuser_password, "BOOTSTRAP_PASSWORD");

        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("campus-loyalty").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".campus-loyalty").join("config.toml"));
        }

        paths
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("config.toml");
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth.jwt_secret (or JWT_SECRET) must be set");
        }

        if self.auth.jwt_secret.len() < 32 {
            warn!("JWT secret is shorter than 32 bytes; use a longer random value in production");
        }

        if self.auth.token_ttl_hours <= 0 {
            anyhow::bail!("auth.token_ttl_hours must be > 0");
        }

        if self.auth.reset_token_ttl_days <= 0 {
            anyhow::bail!("auth.reset_token_ttl_days must be > 0");
        }

        if self.auth.email_domain.trim().is_empty() {
            anyhow::bail!("auth.email_domain cannot be empty");
        }

        url::Url::parse(&self.server.frontend_url).context("server.frontend_url is not a URL")?;

        if self.bootstrap.enabled {
            if self.bootstrap.superuser_password.is_empty() {
                anyhow::bail!(
                    "bootstrap.superuser_password (or BOOTSTRAP_PASSWORD) must be set when bootstrap is enabled"
                );
            }
            crate::auth::validate_password_policy(&self.bootstrap.superuser_password)
                .map_err(|e| anyhow::anyhow!("bootstrap.superuser_password: {e}"))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.reset_token_ttl_days, 7);
        assert_eq!(config.auth.email_domain, "mail.utoronto.ca");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [auth]
            jwt_secret = "file-secret"
            token_ttl_hours = 12
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.auth.token_ttl_hours, 12);
        assert_eq!(config.auth.reset_token_ttl_days, 7);
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = Config::default();
        config.auth.jwt_secret = "file-secret".to_string();

        config.apply_overrides(|key| match key {
            "JWT_SECRET" => Some("env-secret".to_string()),
            "DATABASE_URL" => Some("sqlite:other.db".to_string()),
            "PORT" => Some("8080".to_string()),
            "FRONTEND_URL" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.auth.jwt_secret, "env-secret");
        assert_eq!(config.general.database_url, "sqlite:other.db");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.frontend_url, "http://localhost:5173");
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = Config::default();
        config.bootstrap.enabled = false;
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "x".repeat(32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_bootstrap_password() {
        let mut config = Config::default();
        config.auth.jwt_secret = "x".repeat(32);
        assert!(config.bootstrap.superuser_password.is_empty());
        assert!(config.validate().is_err());

        config.bootstrap.superuser_password = "weak".to_string();
        assert!(config.validate().is_err());

        config.bootstrap.superuser_password = "Str0ng!Admin".to_string();
        assert!(config.validate().is_ok());

        config.bootstrap.enabled = false;
        config.bootstrap.superuser_password.clear();
        assert!(config.validate().is_ok());
    }
}

use thiserror::Error;

/// Default maximum upload size (16 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 16 * 1024 * 1024;

/// Minimum length for an explicitly configured SECRET_KEY
pub const MIN_SECRET_KEY_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Files per listing page
    pub page_size: u32,
    /// Base URL used when building share links
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding the metadata database
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory uploaded files are written to
    pub upload_dir: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// Session signing secret
    pub secret_key: String,
    pub session_ttl_secs: u64,
    /// Admin account created at startup when both are set
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "./uploads".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: random_secret(),
            session_ttl_secs: 24 * 60 * 60,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            node: NodeConfig::default(),
            storage: StorageConfig::default(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            page_size: 10,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

fn random_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let upload_dir = std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "./uploads".to_string());

        let secret_key = match std::env::var("SECRET_KEY") {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!(
                    "SECRET_KEY is not set; using a random key. Sessions will not survive a restart."
                );
                random_secret()
            }
        };

        let session_ttl_secs = std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24 * 60 * 60);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        let page_size = std::env::var("PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_username = std::env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty());
        let admin_password = std::env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());

        let config = Config {
            auth: AuthConfig {
                secret_key,
                session_ttl_secs,
                admin_username,
                admin_password,
            },
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { upload_dir },
            max_upload_size,
            page_size,
            public_base_url,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.len() < MIN_SECRET_KEY_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "SECRET_KEY must be at least {MIN_SECRET_KEY_LENGTH} bytes"
            )));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "PAGE_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.auth.admin_username.is_some() != self.auth.admin_password.is_some() {
            tracing::warn!(
                "Only one of ADMIN_USERNAME and ADMIN_PASSWORD is set; no admin will be bootstrapped"
            );
        }

        Ok(())
    }
}

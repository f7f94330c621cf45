use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub supabase_url: String,
    pub service_key: String,
    pub avatar_bucket: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub cors_max_age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub webhook_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub password_reset_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("STUDIO_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "supabase" => StoreBackend::Supabase,
                _ => self.store.backend,
            };
        }
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.store.supabase_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.service_key = v;
        }
        if let Ok(v) = env::var("SUPABASE_AVATAR_BUCKET") {
            self.store.avatar_bucket = v;
        }
        if let Ok(v) = env::var("SUPABASE_TIMEOUT_SECS") {
            self.store.timeout_secs = v.parse().unwrap_or(self.store.timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_WEBHOOK_URL") {
            self.mail.webhook_url = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }

        if let Ok(v) = env::var("PASSWORD_RESET_TTL_MINUTES") {
            self.auth.password_reset_ttl_minutes = v.parse().unwrap_or(self.auth.password_reset_ttl_minutes);
        }

        self
    }

    /// Checks the settings the server cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.auth.password_reset_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "PASSWORD_RESET_TTL_MINUTES",
                value: self.auth.password_reset_ttl_minutes.to_string(),
            });
        }
        if self.store.backend == StoreBackend::Supabase {
            if self.store.supabase_url.is_empty() {
                return Err(ConfigError::Missing("SUPABASE_URL"));
            }
            if self.store.service_key.is_empty() {
                return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"));
            }
            if url::Url::parse(&self.store.supabase_url).is_err() {
                return Err(ConfigError::Invalid {
                    key: "SUPABASE_URL",
                    value: self.store.supabase_url.clone(),
                });
            }
        }
        // Deployed environments must name their browser origins
        if self.environment != Environment::Development && self.security.cors_origins.is_empty() {
            return Err(ConfigError::Missing("SECURITY_CORS_ORIGINS"));
        }
        if self.mail.webhook_url.is_some() && self.mail.from.is_empty() {
            return Err(ConfigError::Missing("MAIL_FROM"));
        }
        Ok(())
    }

    /// Copy safe for printing: secrets replaced with a marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.store.service_key.is_empty() {
            copy.store.service_key = "<redacted>".to_string();
        }
        if !copy.security.jwt_secret.is_empty() {
            copy.security.jwt_secret = "<redacted>".to_string();
        }
        if copy.mail.api_key.is_some() {
            copy.mail.api_key = Some("<redacted>".to_string());
        }
        copy
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                enable_request_logging: true,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                supabase_url: String::new(),
                service_key: String::new(),
                avatar_bucket: "avatars".to_string(),
                timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["*".to_string()],
                cors_max_age_secs: 600,
            },
            mail: MailConfig {
                webhook_url: None,
                api_key: None,
                from: "no-reply@localhost".to_string(),
            },
            auth: AuthConfig {
                password_reset_ttl_minutes: 15,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                enable_request_logging: true,
            },
            store: StoreConfig {
                backend: StoreBackend::Supabase,
                supabase_url: String::new(),
                service_key: String::new(),
                avatar_bucket: "avatars".to_string(),
                timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: Vec::new(),
                cors_max_age_secs: 3600,
            },
            mail: MailConfig {
                webhook_url: None,
                api_key: None,
                from: String::new(),
            },
            auth: AuthConfig {
                password_reset_ttl_minutes: 15,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 4 * 1024 * 1024, // 4MB, base64 avatars fit
                enable_request_logging: false,
            },
            store: StoreConfig {
                backend: StoreBackend::Supabase,
                supabase_url: String::new(),
                service_key: String::new(),
                avatar_bucket: "avatars".to_string(),
                timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                cors_origins: Vec::new(),
                cors_max_age_secs: 86400,
            },
            mail: MailConfig {
                webhook_url: None,
                api_key: None,
                from: String::new(),
            },
            auth: AuthConfig {
                password_reset_ttl_minutes: 10,
            },
        }
    }

    /// Development defaults with the in-memory backend and a fixed secret.
    pub fn for_tests(jwt_secret: &str) -> Self {
        let mut config = Self::development();
        config.security.jwt_secret = jwt_secret.to_string();
        config
    }
}

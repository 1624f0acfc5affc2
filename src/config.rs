// Configuration de l'application, lue depuis l'environnement (.env chargé par dotenv)

use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_JWT_SECRET: &str = "default-insecure-key-change-this";

/// Domaine "placeholder" : tant que VALID_DOMAIN vaut ça, aucun filtrage par domaine
pub const PLACEHOLDER_DOMAIN: &str = "example.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auto_migrate: bool,

    pub jwt_secret: String,
    pub jwt_expiration_secs: i64,
    pub activation_expiration_secs: i64,
    pub reset_expiration_secs: i64,

    pub valid_domain: String,
    pub frontend_url: String,
    pub cookie_secure: bool,

    pub upload_dir: String,
    pub public_files_url: String,
    pub max_file_size: usize,
    pub presign_ttl_minutes: i64,

    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not found in .env, using default (INSECURE)");
            DEFAULT_JWT_SECRET.to_string()
        });

        Ok(Self {
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "8080")?,
            database_url,
            auto_migrate: try_load("AUTO_MIGRATE", "false")?,
            jwt_secret,
            jwt_expiration_secs: try_load("JWT_EXPIRATION_SECS", "86400")?,
            activation_expiration_secs: try_load("JWT_ACTIVATION_EXPIRATION_SECS", "1800")?,
            reset_expiration_secs: try_load("JWT_RESET_EXPIRATION_SECS", "900")?,
            valid_domain: try_load("VALID_DOMAIN", PLACEHOLDER_DOMAIN)?,
            frontend_url: try_load("FRONTEND_URL", "http://localhost:3000")?,
            cookie_secure: try_load("COOKIE_SECURE", "false")?,
            upload_dir: try_load("UPLOAD_DIR", "./uploads")?,
            public_files_url: try_load("PUBLIC_FILES_URL", "http://127.0.0.1:8080/api/v1/files")?,
            max_file_size: try_load("MAX_FILE_SIZE", "10485760")?,
            presign_ttl_minutes: try_load("PRESIGN_TTL_MINUTES", "15")?,
            mail_api_url: env::var("MAIL_API_URL").ok().filter(|v| !v.trim().is_empty()),
            mail_api_key: env::var("MAIL_API_KEY").ok(),
            mail_from: try_load("MAIL_FROM", "LinkUni <no-reply@linkuni.app>")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Le filtrage par domaine n'est actif que si un vrai domaine est configuré
    pub fn domain_check_enabled(&self) -> bool {
        !self.valid_domain.is_empty() && self.valid_domain != PLACEHOLDER_DOMAIN
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
impl Config {
    /// Configuration utilisée par les tests (aucune variable d'environnement lue)
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            auto_migrate: true,
            jwt_secret: "test-secret-key-for-linkuni".to_string(),
            jwt_expiration_secs: 3600,
            activation_expiration_secs: 1800,
            reset_expiration_secs: 900,
            valid_domain: PLACEHOLDER_DOMAIN.to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cookie_secure: false,
            upload_dir: "./uploads".to_string(),
            public_files_url: "http://127.0.0.1:8080/api/v1/files".to_string(),
            max_file_size: 10 * 1024 * 1024,
            presign_ttl_minutes: 15,
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "LinkUni <no-reply@linkuni.app>".to_string(),
        }
    }
}

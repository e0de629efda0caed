use std::env;
use thiserror::Error;

use crate::import::UnknownCategoryPolicy;

const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_change_me";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Admin account created on first start when the user table is empty
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub import_policy: UnknownCategoryPolicy,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value,
            })?,
            None => 8080,
        };

        let import_policy = match lookup("IMPORT_UNKNOWN_CATEGORIES") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "IMPORT_UNKNOWN_CATEGORIES",
                expected: "'skip' or 'create'",
                value,
            })?,
            None => UnknownCategoryPolicy::default(),
        };

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            DEFAULT_JWT_SECRET.to_string()
        });

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.trim().is_empty() && !password.is_empty() => {
                let username = username.trim().to_string();
                let email = lookup("ADMIN_EMAIL").unwrap_or_else(|| format!("{}@localhost", username));
                Some(AdminBootstrap {
                    username,
                    password,
                    email,
                })
            }
            _ => None,
        };

        Ok(Self {
            port,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "directory.db".to_string()),
            jwt_secret,
            import_policy,
            admin,
        })
    }
}

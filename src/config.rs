use serde::Deserialize;

use crate::error::ConfigError;

/// Session JWT settings (access/refresh pair for the HTTP surface).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Signing key shared by session JWTs and account tokens.
    pub secret_key: String,
    /// New users registering with this email get the administrator role.
    pub admin_email: Option<String>,
    /// Lifetime of confirmation/reset tokens, in seconds.
    pub account_token_ttl_secs: i64,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;
        let secret_key = std::env::var("SECRET_KEY").map_err(|_| ConfigError::MissingSecretKey)?;
        let admin_email = std::env::var("ADMIN_EMAIL")
            .ok()
            .map(|v| v.trim().to_lowercase());
        let account_token_ttl_secs = std::env::var("ACCOUNT_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(3600);
        let session = SessionConfig {
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "inkpost".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "inkpost-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        Ok(Self {
            database_url,
            secret_key,
            admin_email,
            account_token_ttl_secs,
            session,
        })
    }
}

use axum::http::StatusCode;
use thiserror::Error;

/// Startup-fatal configuration problems. Nothing here is recoverable at
/// request time: the process should refuse to come up instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SECRET_KEY is not set")]
    MissingSecretKey,
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("role seed must mark exactly one role as default, found {0}")]
    SeedDefaultRoles(usize),
    #[error("no default role exists; role seeding has not run")]
    MissingDefaultRole,
}

/// Account-token validation failures. Always recovered locally: handlers
/// collapse every variant into one generic client message so a caller cannot
/// tell which check failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token payload is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token purpose does not match")]
    WrongPurpose,
}

pub fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_missing_piece() {
        assert_eq!(ConfigError::MissingSecretKey.to_string(), "SECRET_KEY is not set");
        assert_eq!(
            ConfigError::SeedDefaultRoles(2).to_string(),
            "role seed must mark exactly one role as default, found 2"
        );
    }

    #[test]
    fn internal_hides_the_cause_from_the_client() {
        let (status, message) = internal(anyhow::anyhow!("connection refused"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("connection refused"));
    }
}

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; handlers only see the typed `Config`.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Directory for staged and accepted images
    pub upload_dir: String,
    /// Laplacian-variance threshold below which an image counts as blurry.
    /// Camera/domain dependent, so deliberately not a constant.
    pub blur_variance_threshold: f64,
    /// Points credited to a worker when a visit completes
    pub visit_reward_points: u32,
    /// Brand-detection service endpoint. When unset, the stub detector is used.
    pub detection_service_url: Option<String>,
    /// Timeout for a single detection call
    pub detection_timeout_secs: u64,
    /// Detection attempts before a record is flagged as failed
    pub detection_max_attempts: u32,
    /// Base delay for exponential retry backoff
    pub detection_retry_base_ms: u64,
    /// Number of background detection workers
    pub dispatch_workers: usize,
    /// Capacity of the detection job queue
    pub dispatch_queue_depth: usize,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            blur_variance_threshold: parse_or("BLUR_VARIANCE_THRESHOLD", 100.0)?,
            visit_reward_points: parse_or("VISIT_REWARD_POINTS", 10)?,
            detection_service_url: env::var("DETECTION_SERVICE_URL").ok(),
            detection_timeout_secs: parse_or("DETECTION_TIMEOUT_SECS", 30)?,
            detection_max_attempts: parse_or("DETECTION_MAX_ATTEMPTS", 4)?,
            detection_retry_base_ms: parse_or("DETECTION_RETRY_BASE_MS", 500)?,
            dispatch_workers: parse_or("DISPATCH_WORKERS", 4)?,
            dispatch_queue_depth: parse_or("DISPATCH_QUEUE_DEPTH", 256)?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for tests: no external services, instant retries.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            upload_dir: "uploads".to_string(),
            blur_variance_threshold: 100.0,
            visit_reward_points: 10,
            detection_service_url: None,
            detection_timeout_secs: 5,
            detection_max_attempts: 4,
            detection_retry_base_ms: 1,
            dispatch_workers: 2,
            dispatch_queue_depth: 256,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Environment variable {0} has an invalid value")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_source_threshold() {
        let config = Config::test_default();
        assert_eq!(config.blur_variance_threshold, 100.0);
        assert_eq!(config.visit_reward_points, 10);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("DETECTION_MAX_ATTEMPTS", "not-a-number");
        let err = parse_or::<u32>("DETECTION_MAX_ATTEMPTS", 4).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        env::remove_var("DETECTION_MAX_ATTEMPTS");
    }
}

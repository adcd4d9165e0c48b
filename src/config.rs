//! Configuration for the Mtandao backend server.
//!
//! All configuration is loaded from environment variables; everything else
//! is hardcoded to the original application defaults. No secrets are logged.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    // === Storage ===
    /// Path of the JSON document holding all collections
    pub data_file: PathBuf,

    /// Directory where uploaded media files are written
    pub upload_dir: PathBuf,

    // === Limits ===
    /// Maximum request body size in bytes (default: 16 MiB, bounds uploads)
    pub max_body_size: usize,

    /// bcrypt cost factor for password hashing
    pub bcrypt_cost: u32,

    /// Session inactivity expiry (default: 24 hours)
    pub session_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(2080),

            data_file: std::env::var("DATA_FILE")
                .unwrap_or_else(|_| "data_store.json".to_string())
                .into(),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),

            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16 * 1024 * 1024),
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(bcrypt::DEFAULT_COST),
            session_ttl: Duration::from_secs(
                std::env::var("SESSION_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 3600),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Configuration management for capture-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Numeric values that are present but unparsable abort startup.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub synthesis: SynthesisConfig,
    pub thumbnail: ThumbnailSettings,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// External colorization endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Transport-level retries; never more than one.
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
}

impl SynthesisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8088/api/colorize".to_string(),
            timeout_secs: 60,
            retry_count: 1,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ThumbnailSettings {
    pub jpeg_quality: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    /// Root directory for recorded videos
    pub save_folder_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let synthesis_defaults = SynthesisConfig::default();

        Ok(Config {
            app: AppConfig {
                host: std::env::var("CAPTURE_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env("CAPTURE_SERVICE_PORT", 8086)?,
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/fundus".to_string()),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            synthesis: SynthesisConfig {
                endpoint: std::env::var("SYNTHESIS_ENDPOINT")
                    .unwrap_or(synthesis_defaults.endpoint),
                timeout_secs: parse_env("SYNTHESIS_TIMEOUT_SECS", synthesis_defaults.timeout_secs)?,
                retry_count: parse_env("SYNTHESIS_RETRY_COUNT", synthesis_defaults.retry_count)?
                    .min(1),
                retry_backoff_ms: parse_env(
                    "SYNTHESIS_RETRY_BACKOFF_MS",
                    synthesis_defaults.retry_backoff_ms,
                )?,
            },
            thumbnail: ThumbnailSettings {
                jpeg_quality: parse_env("THUMBNAIL_JPEG_QUALITY", 40u8)?.clamp(1, 100),
            },
            storage: StorageConfig {
                save_folder_path: std::env::var("SAVE_FOLDER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./media")),
            },
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: u32 = parse_env("CAPTURE_SERVICE_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("CAPTURE_SERVICE_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = parse_env("CAPTURE_SERVICE_TEST_BAD_PORT", 8086);
        assert!(result.is_err());
        std::env::remove_var("CAPTURE_SERVICE_TEST_BAD_PORT");
    }

    #[test]
    fn test_synthesis_defaults() {
        let cfg = SynthesisConfig::default();
        assert_eq!(cfg.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.retry_count, 1);
    }
}

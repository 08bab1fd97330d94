use anyhow::{bail, Context, Result};

/// Which platform backend serves auth, key-value and blob storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformBackend {
    /// Everything held in process memory. Lost on restart.
    Memory,
    /// Redis for key-value records and sessions, S3 (or MinIO) for blobs.
    Redis(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: PlatformBackend,
    pub anthropic_api_key: String,
    /// Explicit PDFium library location; searched before the default paths.
    pub pdfium_library_path: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let backend = match lookup("PLATFORM_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => PlatformBackend::Memory,
            "redis" => PlatformBackend::Redis(RemoteConfig {
                redis_url: require("REDIS_URL")?,
                s3_bucket: require("S3_BUCKET")?,
                s3_endpoint: require("S3_ENDPOINT")?,
                aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
                aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            }),
            other => bail!("PLATFORM_BACKEND must be 'memory' or 'redis', got '{other}'"),
        };

        Ok(Config {
            backend,
            anthropic_api_key: require("ANTHROPIC_API_KEY")?,
            pdfium_library_path: lookup("PDFIUM_LIBRARY_PATH").filter(|p| !p.is_empty()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_memory_backend() {
        let config = Config::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "k")])).unwrap();
        assert_eq!(config.backend, PlatformBackend::Memory);
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(config.pdfium_library_path.is_none());
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_redis_backend_requires_remote_vars() {
        let err = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("PLATFORM_BACKEND", "redis"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("PLATFORM_BACKEND", "postgres"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("PORT", "not-a-port"),
        ]));
        assert!(result.is_err());
    }
}

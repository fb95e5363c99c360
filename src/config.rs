//! Configuration loading and types for Folio.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every section has defaults, so a missing file or a
//! partial file still yields a usable configuration.  A handful of
//! deployment-sensitive values (signing secret, store endpoints and
//! credentials) can be overridden from `FOLIO_*` environment variables.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer-token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Document store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Media object store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Orphaned-media reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probe).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum request body size in bytes (multipart uploads included).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Bearer-token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime in seconds. `0` issues tokens without an `exp` claim.
    #[serde(default)]
    pub token_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_seconds: 0,
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Backend type: `sqlite` or `memory`.
    #[serde(default = "default_metadata_engine")]
    pub engine: String,

    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            engine: default_metadata_engine(),
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite-specific metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_metadata_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

/// Media object store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `local`, `memory` or `s3`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// The single bucket all media lives in.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Local filesystem configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,

    /// S3-compatible gateway configuration (MinIO, AWS).
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_bucket(),
            local: LocalStorageConfig::default(),
            s3: None,
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory; the bucket is a subdirectory of it.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
        }
    }
}

/// S3-compatible gateway configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct S3StorageConfig {
    /// Custom endpoint (e.g. `http://localhost:9000` for MinIO).
    #[serde(default)]
    pub endpoint_url: String,
    /// Region to sign requests for.
    #[serde(default = "default_region")]
    pub region: String,
    /// Force path-style addressing (required by MinIO).
    #[serde(default = "default_true")]
    pub use_path_style: bool,
    /// Explicit access key (falls back to the AWS credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit secret key (falls back to the AWS credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

/// Orphaned-media reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between background passes. `0` disables the background task.
    #[serde(default)]
    pub interval_seconds: u64,

    /// Objects younger than this are never collected, so in-flight
    /// create/replace flows are not raced.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 0,
            grace_seconds: default_grace_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings. Both are enabled by default.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable store pings in `/health`.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_upload_size() -> usize {
    10 * 1024 * 1024
}

fn default_jwt_secret() -> String {
    "secret".to_string()
}

fn default_metadata_engine() -> String {
    "sqlite".to_string()
}

fn default_metadata_path() -> String {
    "./data/folio.db".to_string()
}

fn default_storage_backend() -> String {
    "local".to_string()
}

fn default_bucket() -> String {
    "fadel-blog".to_string()
}

fn default_storage_root() -> String {
    "./data/media".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_grace_seconds() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
///
/// A missing file is not an error: defaults are used and environment
/// overrides still apply.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let mut config: Config = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        Config::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Overlay `FOLIO_*` variables onto `config`.
///
/// `lookup` is injected so tests do not have to mutate the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("FOLIO_JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(ttl) = lookup("FOLIO_TOKEN_TTL_SECONDS").and_then(|v| v.parse().ok()) {
        config.auth.token_ttl_seconds = ttl;
    }
    if let Some(path) = lookup("FOLIO_DB_PATH") {
        config.metadata.sqlite.path = path;
    }
    if let Some(bucket) = lookup("FOLIO_BUCKET") {
        config.storage.bucket = bucket;
    }

    let endpoint = lookup("FOLIO_S3_ENDPOINT");
    let access_key = lookup("FOLIO_S3_ACCESS_KEY_ID");
    let secret_key = lookup("FOLIO_S3_SECRET_ACCESS_KEY");
    if endpoint.is_some() || access_key.is_some() || secret_key.is_some() {
        let s3 = config.storage.s3.get_or_insert_with(|| S3StorageConfig {
            region: default_region(),
            use_path_style: true,
            ..S3StorageConfig::default()
        });
        if let Some(endpoint) = endpoint {
            s3.endpoint_url = endpoint;
        }
        if let Some(ak) = access_key {
            s3.access_key_id = ak;
        }
        if let Some(sk) = secret_key {
            s3.secret_access_key = sk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.bucket, "fadel-blog");
        assert_eq!(config.storage.backend, "local");
        assert_eq!(config.metadata.engine, "sqlite");
        assert_eq!(config.auth.token_ttl_seconds, 0);
        assert_eq!(config.reconcile.interval_seconds, 0);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
server:
  port: 9000
storage:
  backend: s3
  s3:
    endpoint_url: http://localhost:9000
auth:
  jwt_secret: hunter2
  token_ttl_seconds: 600
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, "s3");
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.endpoint_url, "http://localhost:9000");
        assert_eq!(s3.region, "us-east-1");
        assert!(s3.use_path_style);
        assert_eq!(config.auth.jwt_secret, "hunter2");
        assert_eq!(config.auth.token_ttl_seconds, 600);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FOLIO_JWT_SECRET", "from-env"),
            ("FOLIO_TOKEN_TTL_SECONDS", "120"),
            ("FOLIO_S3_ENDPOINT", "http://minio:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.auth.token_ttl_seconds, 120);
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.endpoint_url, "http://minio:9000");
        assert!(s3.use_path_style);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}

//! Configuration loading and validation for the envelope service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Which key-encrypting-key backend wraps data keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// AEAD wrapping under `LOCAL_MASTER_KEY`.
    Local,
    /// Remote wrapping by the KMS key `KMS_KEY_ID`.
    Kms,
}

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Key-encrypting-key backend.
    #[serde(default = "default_kek_provider")]
    pub kek_provider: ProviderKind,

    /// Standard base64 of the 32-byte master key. **Required** for `local`.
    pub local_master_key: Option<String>,

    /// KMS key id, ARN or alias. **Required** for `kms`.
    pub kms_key_id: Option<String>,

    /// Also decrypt tokens in the unversioned legacy layout.
    #[serde(default)]
    pub accept_legacy_envelopes: bool,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OTLP endpoint for span export. Spans are not exported when unset.
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_kek_provider() -> ProviderKind {
    ProviderKind::Local
}
fn default_listen_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        match self.kek_provider {
            ProviderKind::Local => {
                ensure_non_empty(self.local_master_key.as_deref(), "LOCAL_MASTER_KEY")?
            }
            ProviderKind::Kms => ensure_non_empty(self.kms_key_id.as_deref(), "KMS_KEY_ID")?,
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must not be empty when set");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("kek_provider", &self.kek_provider)
            .field(
                "local_master_key",
                &self.local_master_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kms_key_id", &self.kms_key_id)
            .field("accept_legacy_envelopes", &self.accept_legacy_envelopes)
            .field("listen_port", &self.listen_port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: Option<&str>, name: &str) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => anyhow::bail!("{name} is required and must not be empty"),
    }
}

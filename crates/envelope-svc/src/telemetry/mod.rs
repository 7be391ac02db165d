//! Tracing setup: structured JSON logs, plus OTLP span export when an
//! endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, key material or context values** may appear in any span
//!   attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden
//!   by `RUST_LOG` when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};

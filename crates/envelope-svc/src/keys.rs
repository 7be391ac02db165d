//! Key-encrypting-key bootstrap from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use base64::{engine::general_purpose::STANDARD, Engine};
use envelope::{KekProvider, LocalAeadKeyProvider, RemoteKmsKeyProvider};
use tracing::info;
use zeroize::Zeroizing;

use crate::config::{Config, ProviderKind};

/// Build the provider selected by `KEK_PROVIDER`.
///
/// For `kms` this loads credentials through the standard AWS chain and
/// resolves the key once, so a missing key or denied access fails startup.
///
/// # Errors
///
/// Returns an error if the key material is unusable or the KMS key cannot be
/// described.
pub async fn build_provider(cfg: &Config) -> Result<Arc<dyn KekProvider>> {
    let provider: Arc<dyn KekProvider> = match cfg.kek_provider {
        ProviderKind::Local => {
            let encoded = cfg
                .local_master_key
                .as_deref()
                .context("LOCAL_MASTER_KEY is required for the local provider")?;
            Arc::new(local_provider(encoded)?)
        }
        ProviderKind::Kms => {
            let key_id = cfg
                .kms_key_id
                .as_deref()
                .context("KMS_KEY_ID is required for the kms provider")?;
            let sdk = aws_config::defaults(BehaviorVersion::latest()).load().await;
            let client = aws_sdk_kms::Client::new(&sdk);
            let provider = RemoteKmsKeyProvider::new(client, key_id)
                .await
                .with_context(|| format!("failed to resolve KMS key {key_id}"))?;
            Arc::new(provider)
        }
    };

    info!(kek_id = %provider.id(), provider = ?cfg.kek_provider, "key encryption key ready");
    Ok(provider)
}

fn local_provider(encoded: &str) -> Result<LocalAeadKeyProvider> {
    let master = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .context("LOCAL_MASTER_KEY is not valid base64")?,
    );
    LocalAeadKeyProvider::new(&master).context("LOCAL_MASTER_KEY must decode to 32 bytes")
}

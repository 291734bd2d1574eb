//! Bootstrap of the signing and encryption secrets kept in the config store.

use crate::error::AppError;
use crate::store::ConfigStore;

pub const SECRETS_NAMESPACE: &str = "backend";
pub const JWT_SECRET_KEY: &str = "jwt.secret";
pub const ENCRYPTION_SECRET_KEY: &str = "encryption.secret";
pub const MIN_ENCRYPTION_SECRET_LEN: usize = 10;

/// Make sure `jwt.secret` and `encryption.secret` exist. Present, valid values are never rewritten.
///
/// A failed jwt write is logged and startup continues. The result is that of the encryption
/// secret write, or `Ok` when the stored encryption secret was already valid.
pub async fn ensure_secrets(store: &dyn ConfigStore) -> Result<(), AppError> {
    if let Err(e) = store.get(JWT_SECRET_KEY, SECRETS_NAMESPACE).await {
        log_read_miss(JWT_SECRET_KEY, &e);
        let secret = uuid::Uuid::new_v4().to_string();
        if let Err(e) = store.set(JWT_SECRET_KEY, &secret, SECRETS_NAMESPACE).await {
            tracing::error!(error = %e, "failed to store jwt secret");
        }
    }

    let current = store.get(ENCRYPTION_SECRET_KEY, SECRETS_NAMESPACE).await;
    let needs_new = match &current {
        Ok(value) => value.len() < MIN_ENCRYPTION_SECRET_LEN,
        Err(e) => {
            log_read_miss(ENCRYPTION_SECRET_KEY, e);
            true
        }
    };
    if !needs_new {
        return Ok(());
    }
    if current.is_ok() {
        tracing::warn!(key = ENCRYPTION_SECRET_KEY, "stored secret too short, replacing");
    }
    let secret = uuid::Uuid::new_v4().simple().to_string();
    store
        .set(ENCRYPTION_SECRET_KEY, &secret, SECRETS_NAMESPACE)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to store encryption secret"))
}

fn log_read_miss(key: &str, e: &AppError) {
    match e {
        AppError::NotFound(_) => tracing::info!(key, "secret not set, generating"),
        other => tracing::warn!(key, error = %other, "failed to read secret, generating"),
    }
}

//! In-memory secret registry with lazy materialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{Secret, SecretString, SecretView};
use super::SecretError;
use crate::fsutil;
use crate::session::Lifecycle;

/// Longest id used verbatim as a material file name.
const MAX_PLAIN_FILE_NAME: usize = 128;

/// Secrets registered for the current session, keyed by caller-supplied id.
///
/// Nothing touches the disk until [`SecretRegistry::get`] is called on an SSH key.
#[derive(Clone)]
pub struct SecretRegistry {
    material_dir: PathBuf,
    secrets: Arc<RwLock<HashMap<String, Secret>>>,
    lifecycle: Lifecycle,
}

impl SecretRegistry {
    pub(crate) fn new(material_dir: PathBuf, lifecycle: Lifecycle) -> Self {
        Self {
            material_dir,
            secrets: Arc::new(RwLock::new(HashMap::new())),
            lifecycle,
        }
    }

    /// Directory where SSH keys are materialized.
    pub fn material_dir(&self) -> &Path {
        &self.material_dir
    }

    pub async fn add_text(
        &self,
        id: &str,
        text: impl Into<SecretString>,
    ) -> Result<(), SecretError> {
        self.insert(id, Secret::Text { text: text.into() }).await
    }

    pub async fn add_ssh_private_key(
        &self,
        id: &str,
        user: &str,
        private_key: impl Into<SecretString>,
        passphrase: impl Into<SecretString>,
    ) -> Result<(), SecretError> {
        self.insert(
            id,
            Secret::SshPrivateKey {
                user: user.to_string(),
                private_key: private_key.into(),
                passphrase: passphrase.into(),
            },
        )
        .await
    }

    pub async fn add_user_password(
        &self,
        id: &str,
        user: &str,
        password: impl Into<SecretString>,
    ) -> Result<(), SecretError> {
        self.insert(
            id,
            Secret::UserPassword {
                user: user.to_string(),
                password: password.into(),
            },
        )
        .await
    }

    /// Register `secret` under `id`, replacing whatever was there.
    pub async fn insert(&self, id: &str, secret: Secret) -> Result<(), SecretError> {
        let _session = self.lifecycle.enter().await.ok_or(SecretError::SessionClosed)?;
        let kind = secret.kind();
        let previous = self.secrets.write().await.insert(id.to_string(), secret);
        debug!(
            secret_id = %id,
            kind = %kind,
            replaced = previous.is_some(),
            "Secret registered"
        );
        Ok(())
    }

    /// Read the secret under `id`.
    ///
    /// SSH keys are written to `<material_dir>/<id>` (mode `0600`) on every call.
    /// The file is swapped in with a rename, so a path handed to an earlier
    /// caller always holds the complete key. A failed write is reported as
    /// [`SecretError::NotFound`].
    pub async fn get(&self, id: &str) -> Result<SecretView, SecretError> {
        let _session = self.lifecycle.enter().await.ok_or(SecretError::SessionClosed)?;

        // Held until the key is on disk so an overwrite of `id` cannot interleave.
        let secrets = self.secrets.read().await;
        let secret = secrets
            .get(id)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(id.to_string()))?;

        let view = match secret {
            Secret::Text { text } => SecretView::Text { text },
            Secret::UserPassword { user, password } => SecretView::UserPassword { user, password },
            Secret::SshPrivateKey {
                user,
                private_key,
                passphrase,
            } => {
                let path = self.material_path(id);
                if let Err(e) =
                    fsutil::replace_private_file(&path, private_key.expose().as_bytes()).await
                {
                    warn!(secret_id = %id, error = %e, "Failed to materialize private key");
                    return Err(SecretError::NotFound(id.to_string()));
                }
                debug!(secret_id = %id, "Private key materialized");
                SecretView::SshPrivateKey {
                    user,
                    private_key_file: path,
                    passphrase,
                }
            }
        };
        drop(secrets);

        Ok(view)
    }

    /// Drop the secret under `id` along with any materialized key file.
    ///
    /// Returns whether a secret was registered.
    pub async fn remove(&self, id: &str) -> Result<bool, SecretError> {
        let _session = self.lifecycle.enter().await.ok_or(SecretError::SessionClosed)?;
        let removed = self.secrets.write().await.remove(id);

        if let Some(Secret::SshPrivateKey { .. }) = removed {
            let path = self.material_path(id);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(secret_id = %id, error = %e, "Failed to remove key file"),
            }
        }

        if removed.is_some() {
            debug!(secret_id = %id, "Secret removed");
        }
        Ok(removed.is_some())
    }

    pub async fn contains(&self, id: &str) -> Result<bool, SecretError> {
        let _session = self.lifecycle.enter().await.ok_or(SecretError::SessionClosed)?;
        Ok(self.secrets.read().await.contains_key(id))
    }

    /// Registered ids, sorted.
    pub async fn ids(&self) -> Result<Vec<String>, SecretError> {
        let _session = self.lifecycle.enter().await.ok_or(SecretError::SessionClosed)?;
        let mut ids: Vec<String> = self.secrets.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn material_path(&self, id: &str) -> PathBuf {
        self.material_dir.join(material_file_name(id))
    }
}

/// File name for a secret's materialized key.
///
/// Ids that are already plain file names are used as-is; anything else becomes
/// `~` followed by its SHA-256 hex digest. `~` never appears in a plain id, so
/// the two forms cannot collide.
pub fn material_file_name(id: &str) -> String {
    let plain = !id.is_empty()
        && id.len() <= MAX_PLAIN_FILE_NAME
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if plain {
        id.to_string()
    } else {
        format!("~{}", hex::encode(Sha256::digest(id.as_bytes())))
    }
}

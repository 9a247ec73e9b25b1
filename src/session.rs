//! Session lifecycle: owns the temporary directory tree and the two stores built on it.
//!
//! ```text
//! <session-root>/
//! ├── stash/     # ContentStash entries, one per handle
//! └── secrets/   # materialized SSH keys, one per secret id
//! ```
//!
//! Opening a session wipes whatever a previous (possibly crashed) run left at
//! the same root. `close()` removes the whole tree; dropping a session that was
//! never closed does the same synchronously.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::config::Config;
use crate::fsutil;
use crate::secrets::{SecretError, SecretRegistry, SecretView};
use crate::stash::{ContentStash, StashError, StashHandle};

const STASH_DIR: &str = "stash";
const SECRETS_DIR: &str = "secrets";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to clear stale session root {path}: {source}")]
    ClearStale {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create session directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove session root {path}: {source}")]
    RemoveRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is closed")]
    SessionClosed,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

/// Shared lifecycle flag.
///
/// Store operations hold a read guard while they run; `close` takes the write
/// guard, so teardown waits for in-flight work and nothing starts afterwards.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    state: Arc<RwLock<SessionState>>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Uninitialized)),
        }
    }

    #[cfg(test)]
    pub(crate) fn ready() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Ready)),
        }
    }

    #[cfg(test)]
    pub(crate) async fn mark_closed(&self) {
        *self.state.write().await = SessionState::Closed;
    }

    /// Guard for one operation, or `None` if the session is not ready.
    pub(crate) async fn enter(&self) -> Option<RwLockReadGuard<'_, SessionState>> {
        let guard = self.state.read().await;
        (*guard == SessionState::Ready).then_some(guard)
    }
}

/// One execution session.
pub struct Session {
    root: PathBuf,
    keep_on_drop: bool,
    lifecycle: Lifecycle,
    secrets: SecretRegistry,
    stash: ContentStash,
}

impl Session {
    /// Provision a fresh session tree at `config.session_root`.
    ///
    /// Anything already at that path is deleted first.
    pub async fn open(config: &Config) -> Result<Self, SessionError> {
        let root = config.session_root.clone();
        let stash_dir = root.join(STASH_DIR);
        let secrets_dir = root.join(SECRETS_DIR);

        if tokio::fs::symlink_metadata(&root).await.is_ok() {
            warn!(root = %root.display(), "Removing stale session directory");
        }
        fsutil::remove_dir_if_exists(&root)
            .await
            .map_err(|source| SessionError::ClearStale {
                path: root.display().to_string(),
                source,
            })?;

        for dir in [&root, &stash_dir, &secrets_dir] {
            fsutil::create_private_dir(dir)
                .await
                .map_err(|source| SessionError::CreateDir {
                    path: dir.display().to_string(),
                    source,
                })?;
        }

        let lifecycle = Lifecycle::new();
        *lifecycle.state.write().await = SessionState::Ready;

        info!(root = %root.display(), "Session opened");

        Ok(Self {
            secrets: SecretRegistry::new(secrets_dir, lifecycle.clone()),
            stash: ContentStash::new(stash_dir, root.clone(), lifecycle.clone()),
            root,
            keep_on_drop: config.keep_on_drop,
            lifecycle,
        })
    }

    /// Open a session, run `f` against it, and close it whatever `f` returned.
    ///
    /// A close failure is logged; it is returned only when `f` succeeded.
    pub async fn run<F, Fut, T, E>(config: &Config, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SessionError>,
    {
        let session = Arc::new(Session::open(config).await?);
        let result = f(Arc::clone(&session)).await;
        let closed = session.close().await;

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Session close failed after an earlier error");
                Err(e)
            }
        }
    }

    /// Remove the session tree. Waits for in-flight operations to finish.
    ///
    /// The session is `Closed` afterwards even if removal failed.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.lifecycle.state.write().await;
        if *state != SessionState::Ready {
            return Err(SessionError::SessionClosed);
        }
        *state = SessionState::Closed;

        match fsutil::remove_dir_if_exists(&self.root).await {
            Ok(()) => {
                info!(root = %self.root.display(), "Session closed");
                Ok(())
            }
            Err(source) => {
                warn!(root = %self.root.display(), error = %source, "Failed to remove session root");
                Err(SessionError::RemoveRoot {
                    path: self.root.display().to_string(),
                    source,
                })
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.lifecycle.state.read().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stash_dir(&self) -> &Path {
        self.stash.root()
    }

    pub fn secrets_dir(&self) -> &Path {
        self.secrets.material_dir()
    }

    pub fn secrets(&self) -> &SecretRegistry {
        &self.secrets
    }

    pub fn stash(&self) -> &ContentStash {
        &self.stash
    }

    pub async fn get_secret(&self, id: &str) -> Result<SecretView, SecretError> {
        self.secrets.get(id).await
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<StashHandle, StashError> {
        self.stash.save(path).await
    }

    pub async fn load(&self, handle: &str) -> Result<Vec<u8>, StashError> {
        self.stash.load(handle).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let still_ready = self
            .lifecycle
            .state
            .try_read()
            .map(|state| *state == SessionState::Ready)
            .unwrap_or(false);
        if !still_ready || self.keep_on_drop {
            return;
        }

        warn!(root = %self.root.display(), "Session dropped without close, removing tree");
        if let Err(e) = fsutil::remove_dir_if_exists_blocking(&self.root) {
            warn!(root = %self.root.display(), error = %e, "Failed to remove session root on drop");
        }
    }
}

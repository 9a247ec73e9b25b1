//! Content stash: capture a file now, read it back later in the same session.
//!
//! `save` copies a file or directory tree to `<session-root>/stash/<handle>`
//! and returns a fresh handle. `load` returns the bytes captured at save time,
//! regardless of what happened to the source afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config;
use crate::fsutil;
use crate::session::Lifecycle;

#[derive(Debug, Error)]
pub enum StashError {
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to stash {path}: {source}")]
    CopyFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stash entry not found: {0}")]
    NotFound(String),

    #[error("Failed to read stash entry {handle}: {source}")]
    ReadFailed {
        handle: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stash entry {0} is a directory and cannot be loaded as bytes")]
    NotAFile(String),

    #[error("Session is closed")]
    SessionClosed,
}

/// Opaque token naming one stash entry. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StashHandle(Uuid);

impl StashHandle {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StashHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for StashHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What a stash entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// Bookkeeping for one saved entry.
#[derive(Debug, Clone, Serialize)]
pub struct StashRecord {
    pub handle: StashHandle,
    /// Absolute source path at save time
    pub source: PathBuf,
    pub kind: EntryKind,
    pub saved_at: DateTime<Utc>,
}

/// Session-scoped content stash.
#[derive(Clone)]
pub struct ContentStash {
    root: PathBuf,
    /// Session directory the stash lives in; never copied into itself.
    session_root: PathBuf,
    records: Arc<RwLock<HashMap<StashHandle, StashRecord>>>,
    lifecycle: Lifecycle,
}

impl ContentStash {
    pub(crate) fn new(root: PathBuf, session_root: PathBuf, lifecycle: Lifecycle) -> Self {
        Self {
            root,
            session_root,
            records: Arc::new(RwLock::new(HashMap::new())),
            lifecycle,
        }
    }

    /// Directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `source` (file or directory) into the stash and return its handle.
    ///
    /// On failure nothing is left in the stash and no handle is issued.
    /// Paths inside the session directory are rejected; when `source` contains
    /// the session directory, that subtree is left out of the copy.
    pub async fn save(&self, source: impl AsRef<Path>) -> Result<StashHandle, StashError> {
        let _session = self
            .lifecycle
            .enter()
            .await
            .ok_or(StashError::SessionClosed)?;

        let source = source.as_ref();
        let display = source.display().to_string();
        if source.as_os_str().is_empty() {
            return Err(StashError::InvalidPath {
                path: display,
                reason: "empty path".to_string(),
            });
        }
        let absolute = config::absolutize(source).map_err(|e| StashError::InvalidPath {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let copy_failed = |source: std::io::Error| StashError::CopyFailed {
            path: absolute.display().to_string(),
            source,
        };
        let session_root = tokio::fs::canonicalize(&self.session_root)
            .await
            .map_err(copy_failed)?;
        let resolved = tokio::fs::canonicalize(&absolute)
            .await
            .map_err(copy_failed)?;
        if resolved.starts_with(&session_root) {
            return Err(StashError::InvalidPath {
                path: display,
                reason: "path is inside the session directory".to_string(),
            });
        }

        let handle = self.fresh_handle().await;
        let staging = self.root.join(format!(".{}.partial", handle));
        let target = self.entry_path(&handle);

        let copied = async {
            fsutil::copy_item(&absolute, &staging, Some(&session_root)).await?;
            tokio::fs::rename(&staging, &target).await
        }
        .await;

        if let Err(source) = copied {
            discard(&staging).await;
            return Err(copy_failed(source));
        }

        let kind = match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            _ => EntryKind::File,
        };

        let record = StashRecord {
            handle,
            source: absolute,
            kind,
            saved_at: Utc::now(),
        };
        debug!(
            handle = %handle,
            source = %record.source.display(),
            kind = ?kind,
            "Stashed content"
        );
        self.records.write().await.insert(handle, record);

        Ok(handle)
    }

    /// Return the bytes saved under `handle`.
    ///
    /// Handles that are not well-formed are treated as unknown.
    pub async fn load(&self, handle: &str) -> Result<Vec<u8>, StashError> {
        let _session = self
            .lifecycle
            .enter()
            .await
            .ok_or(StashError::SessionClosed)?;

        let parsed: StashHandle = handle
            .parse()
            .map_err(|_| StashError::NotFound(handle.to_string()))?;
        let path = self.entry_path(&parsed);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StashError::NotFound(handle.to_string()));
            }
            Err(source) => {
                return Err(StashError::ReadFailed {
                    handle: handle.to_string(),
                    source,
                });
            }
        };
        if metadata.is_dir() {
            return Err(StashError::NotAFile(handle.to_string()));
        }

        let bytes = read_entry(&path, handle).await?;
        debug!(handle = %parsed, bytes = bytes.len(), "Loaded stash entry");
        Ok(bytes)
    }

    pub async fn contains(&self, handle: &StashHandle) -> Result<bool, StashError> {
        let _session = self
            .lifecycle
            .enter()
            .await
            .ok_or(StashError::SessionClosed)?;
        Ok(self.records.read().await.contains_key(handle))
    }

    /// Saved entries, oldest first.
    pub async fn records(&self) -> Result<Vec<StashRecord>, StashError> {
        let _session = self
            .lifecycle
            .enter()
            .await
            .ok_or(StashError::SessionClosed)?;
        let mut records: Vec<StashRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.saved_at.cmp(&b.saved_at));
        Ok(records)
    }

    fn entry_path(&self, handle: &StashHandle) -> PathBuf {
        self.root.join(handle.to_string())
    }

    async fn fresh_handle(&self) -> StashHandle {
        let records = self.records.read().await;
        loop {
            let handle = StashHandle::generate();
            if !records.contains_key(&handle) {
                return handle;
            }
        }
    }
}

async fn read_entry(path: &Path, handle: &str) -> Result<Vec<u8>, StashError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| StashError::ReadFailed {
            handle: handle.to_string(),
            source,
        })
}

/// Remove a half-written staging entry, whatever shape it has.
async fn discard(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to discard partial stash entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn stash() -> (tempfile::TempDir, ContentStash, Lifecycle) {
        let temp = tempfile::tempdir().expect("tempdir");
        let session_root = temp.path().join(".runvault");
        let root = session_root.join("stash");
        fsutil::create_private_dir(&root).await.expect("create stash");
        let lifecycle = Lifecycle::ready();
        let stash = ContentStash::new(root, session_root, lifecycle.clone());
        (temp, stash, lifecycle)
    }

    #[tokio::test]
    async fn save_then_load_survives_source_changes() {
        let (temp, stash, _) = stash().await;
        let source = temp.path().join("report.txt");
        tokio::fs::write(&source, b"first version").await.unwrap();

        let handle = stash.save(&source).await.expect("save");
        tokio::fs::write(&source, b"second version").await.unwrap();

        let bytes = stash.load(&handle.to_string()).await.expect("load");
        assert_eq!(bytes, b"first version");
        // Repeated loads are identical.
        assert_eq!(stash.load(&handle.to_string()).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn entries_live_under_handle_name() {
        let (temp, stash, _) = stash().await;
        let source = temp.path().join("a.bin");
        tokio::fs::write(&source, [0u8, 1, 2]).await.unwrap();

        let handle = stash.save(&source).await.unwrap();
        assert!(stash.root().join(handle.to_string()).is_file());
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let (temp, stash, _) = stash().await;
        let source = temp.path().join("a.txt");
        tokio::fs::write(&source, b"x").await.unwrap();

        let a = stash.save(&source).await.unwrap();
        let b = stash.save(&source).await.unwrap();
        assert_ne!(a, b);
        assert!(stash.contains(&a).await.unwrap());
        assert!(!stash.contains(&StashHandle::generate()).await.unwrap());
        assert_eq!(stash.records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_file_is_not_missing() {
        let (temp, stash, _) = stash().await;
        let source = temp.path().join("empty");
        tokio::fs::write(&source, b"").await.unwrap();

        let handle = stash.save(&source).await.unwrap();
        assert!(stash.load(&handle.to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let (_temp, stash, _) = stash().await;
        let unknown = Uuid::new_v4().to_string();
        assert!(matches!(
            stash.load(&unknown).await,
            Err(StashError::NotFound(h)) if h == unknown
        ));
        assert!(matches!(
            stash.load("never-saved-handle").await,
            Err(StashError::NotFound(_))
        ));
        assert!(matches!(
            stash.load("../../etc/passwd").await,
            Err(StashError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_source_fails_without_leftovers() {
        let (temp, stash, _) = stash().await;
        let err = stash.save(temp.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, StashError::CopyFailed { .. }));

        let mut entries = tokio::fs::read_dir(stash.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(stash.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_path_is_invalid() {
        let (_temp, stash, _) = stash().await;
        assert!(matches!(
            stash.save("").await,
            Err(StashError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn directories_are_saved_but_not_loaded() {
        let (temp, stash, _) = stash().await;
        let dir = temp.path().join("tree");
        tokio::fs::create_dir_all(dir.join("nested")).await.unwrap();
        tokio::fs::write(dir.join("nested/file.txt"), b"hi").await.unwrap();

        let handle = stash.save(&dir).await.expect("save dir");
        let copied = stash.root().join(handle.to_string()).join("nested/file.txt");
        assert_eq!(tokio::fs::read(copied).await.unwrap(), b"hi");

        let records = stash.records().await.unwrap();
        assert_eq!(records[0].kind, EntryKind::Directory);
        assert_eq!(records[0].source, dir);

        assert!(matches!(
            stash.load(&handle.to_string()).await,
            Err(StashError::NotAFile(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_entry_is_read_failed() {
        let (temp, stash, _) = stash().await;
        let source = temp.path().join("a.txt");
        tokio::fs::write(&source, b"x").await.unwrap();
        let handle = stash.save(&source).await.unwrap();

        // A self-referencing symlink fails with ELOOP, even for root.
        let entry = stash.root().join(handle.to_string());
        tokio::fs::remove_file(&entry).await.unwrap();
        std::os::unix::fs::symlink(&entry, &entry).unwrap();

        assert!(matches!(
            stash.load(&handle.to_string()).await,
            Err(StashError::ReadFailed { handle: h, .. }) if h == handle.to_string()
        ));
    }

    #[tokio::test]
    async fn read_entry_reports_io_errors_as_read_failed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_entry(temp.path(), "h").await.unwrap_err();
        assert!(matches!(err, StashError::ReadFailed { handle, .. } if handle == "h"));
    }

    #[tokio::test]
    async fn saving_a_parent_of_the_session_skips_the_session_tree() {
        let (temp, stash, _) = stash().await;
        tokio::fs::write(temp.path().join("a.txt"), b"a").await.unwrap();

        let handle = stash.save(temp.path()).await.expect("save parent");
        let copy = stash.root().join(handle.to_string());
        assert_eq!(tokio::fs::read(copy.join("a.txt")).await.unwrap(), b"a");
        assert!(!copy.join(".runvault").exists());

        // Nothing but the finished entry is left in the stash.
        let mut entries = tokio::fs::read_dir(stash.root()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, vec![std::ffi::OsString::from(handle.to_string())]);
    }

    #[tokio::test]
    async fn paths_inside_the_session_are_invalid() {
        let (_temp, stash, _) = stash().await;
        let err = stash.save(stash.root()).await.unwrap_err();
        assert!(matches!(err, StashError::InvalidPath { .. }));
        assert!(stash.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_lifecycle_rejects_save_and_load() {
        let (temp, stash, lifecycle) = stash().await;
        let source = temp.path().join("a.txt");
        tokio::fs::write(&source, b"x").await.unwrap();
        let handle = stash.save(&source).await.unwrap();

        lifecycle.mark_closed().await;
        assert!(matches!(
            stash.save(&source).await,
            Err(StashError::SessionClosed)
        ));
        assert!(matches!(
            stash.load(&handle.to_string()).await,
            Err(StashError::SessionClosed)
        ));
    }

    #[test]
    fn handle_display_round_trips_through_parse() {
        let handle = StashHandle::generate();
        let parsed: StashHandle = handle.to_string().parse().unwrap();
        assert_eq!(parsed, handle);
        assert!("not-a-handle".parse::<StashHandle>().is_err());
    }
}

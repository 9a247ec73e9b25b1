//! Filesystem primitives shared by the session, the secret registry and the stash.
//!
//! Everything here is owner-only on unix: directories are created `0700`,
//! secret material is written `0600`.

use std::io;
use std::path::Path;

use async_recursion::async_recursion;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[cfg(unix)]
const PRIVATE_DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;

/// Create `path` (and parents) and restrict it to the owning user.
pub async fn create_private_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_DIR_MODE))
            .await?;
    }

    Ok(())
}

/// Remove a directory tree, treating "already gone" as success.
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Blocking variant of [`remove_dir_if_exists`], for `Drop` impls.
pub fn remove_dir_if_exists_blocking(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Write `contents` to `path`, truncating any previous file, with owner-only permissions.
///
/// Permissions are reset even when the file already existed with a wider mode.
pub async fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(PRIVATE_FILE_MODE);

    let mut file = options.open(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))
            .await?;
    }

    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Replace `path` with `contents` (owner-only) via a temp file and `rename`.
///
/// Readers holding the old path see either the previous file or the complete
/// new one, never a truncated file.
pub async fn replace_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = dir.join(format!(".{}.{}.tmp", name.to_string_lossy(), Uuid::new_v4()));

    let written = async {
        write_private_file(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

/// Copy a file, or a directory tree recursively, from `src` to `dst`.
///
/// `dst` must not exist yet. Symlinks are followed. A subdirectory whose
/// canonical path equals `exclude` is skipped, along with everything under it.
pub async fn copy_item(src: &Path, dst: &Path, exclude: Option<&Path>) -> io::Result<()> {
    let metadata = tokio::fs::metadata(src).await?;
    if metadata.is_dir() {
        copy_dir_recursive(src, dst, exclude).await
    } else {
        tokio::fs::copy(src, dst).await.map(|_| ())
    }
}

#[async_recursion]
async fn copy_dir_recursive(src: &Path, dst: &Path, exclude: Option<&Path>) -> io::Result<()> {
    tokio::fs::create_dir_all(dst).await?;

    let mut entries = tokio::fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let dest_path = dst.join(entry.file_name());

        let metadata = tokio::fs::metadata(&entry_path).await?;
        if metadata.is_dir() {
            if let Some(exclude) = exclude {
                if tokio::fs::canonicalize(&entry_path).await? == exclude {
                    continue;
                }
            }
            copy_dir_recursive(&entry_path, &dest_path, exclude).await?;
        } else {
            tokio::fs::copy(&entry_path, &dest_path).await?;
        }
    }

    Ok(())
}

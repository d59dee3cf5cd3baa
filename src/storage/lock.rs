//! Advisory per-document locks.
//!
//! A lock is a sibling `<path>.lock` file created with `create_new`, which is
//! atomic on every platform we care about and visible across processes.
//! Acquisition retries on contention for a bounded interval, then fails; it
//! never hangs. Lock files left behind by a crashed holder are reclaimed once
//! they pass the staleness horizon.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PluginError;

const MAX_ATTEMPTS: u32 = 200;
const RETRY_INTERVAL: Duration = Duration::from_millis(25);
const STALE_AFTER: Duration = Duration::from_secs(30);

/// Run `f` while holding the advisory lock for `path`.
///
/// No concurrent `with_lock` call on the same path runs at the same time,
/// whether in this process or another one. The lock file is removed after `f`
/// resolves, on success and on error alike.
pub async fn with_lock<T, F, Fut>(path: &Path, f: F) -> Result<T, PluginError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, PluginError>>,
{
    let lock_path = lock_path_for(path);
    acquire(path, &lock_path).await?;

    let result = f().await;

    if let Err(e) = tokio::fs::remove_file(&lock_path).await {
        tracing::debug!(lock = %lock_path.display(), error = %e, "Failed to remove lock file");
    }
    result
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

async fn acquire(path: &Path, lock_path: &Path) -> Result<(), PluginError> {
    if let Some(parent) = lock_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    for _ in 0..MAX_ATTEMPTS {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
            .await
        {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                let _ = file.write_all(std::process::id().to_string().as_bytes()).await;
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_stale(lock_path).await {
                    tracing::warn!(lock = %lock_path.display(), "Reclaiming stale lock file");
                    let _ = tokio::fs::remove_file(lock_path).await;
                    continue;
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(PluginError::LockTimeout {
        path: path.to_path_buf(),
    })
}

async fn is_stale(lock_path: &Path) -> bool {
    match tokio::fs::metadata(lock_path).await {
        Ok(meta) => meta
            .modified()
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .is_some_and(|age| age > STALE_AFTER),
        // Holder released between our open attempt and this check.
        Err(_) => false,
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory watching: a startup scan (oldest file first) followed by
//! live close-after-write notifications, both feeding
//! [`BinaryTransfer`](crate::sender::BinaryTransfer)'s backlog.

use crate::error::TransferError;
use crate::queue::PendingFile;
use crate::sender::BinaryTransfer;
use crate::transport::GsnBinaryChannel;
use crate::watch::Watch;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Walk every configured watch directory, collect regular files, and
/// sort ascending by mtime so the oldest file is transmitted first.
pub fn scan_startup_files(
    watches: &[Watch],
    root: &Path,
) -> Result<Vec<PendingFile>, TransferError> {
    let mut files = Vec::new();

    for watch in watches {
        let dir = if watch.relative_path == "." {
            root.to_path_buf()
        } else {
            root.join(&watch.relative_path)
        };
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis())
                .unwrap_or(0);
            files.push((mtime, PendingFile {
                path,
                size_at_enqueue: metadata.len(),
            }));
        }
    }

    files.sort_by_key(|(mtime, _)| *mtime);
    Ok(files.into_iter().map(|(_, f)| f).collect())
}

/// Spawn a background task watching `root` for close-after-write
/// events, feeding each new regular file to `transfer.on_file_created`.
/// Returns a handle that stops the watcher when sent to.
pub fn spawn_watcher<T>(transfer: Arc<BinaryTransfer<T>>, root: PathBuf) -> oneshot::Sender<()>
where
    T: GsnBinaryChannel + Send + Sync + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(watch_loop(transfer, root, shutdown_rx));
    shutdown_tx
}

async fn watch_loop<T>(
    transfer: Arc<BinaryTransfer<T>>,
    root: PathBuf,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    T: GsnBinaryChannel + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher_guard = match create_fs_watcher(&root, tx) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(error = %e, root = %root.display(), "failed to start directory watcher");
            None
        }
    };

    loop {
        tokio::select! {
            Some(path) = rx.recv() => {
                let Ok(metadata) = std::fs::metadata(&path) else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                debug!(path = %path.display(), "watch event: new file");
                transfer.on_file_created(path, metadata.len()).await;
            }
            _ = &mut shutdown_rx => {
                return;
            }
        }
    }
}

fn create_fs_watcher(
    root: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        for path in event.paths {
            let _ = tx.blocking_send(path);
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sender-side orchestration: at most one transfer in flight, fed by
//! [`PendingQueue`], driven by the ack-matching table in
//! `4.D.2` of the binary transfer design.

use crate::error::TransferError;
use crate::queue::{PendingFile, PendingQueue};
use crate::state::{restore_writable, LastSent, ResumeOutcome, TransferState};
use crate::transport::GsnBinaryChannel;
use crate::watch::{select_watch, Watch};
use crate::wire::{AgentPacket, GsnPacket, PacketType, CHUNK_SIZE};
use bl_core::Counters;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

pub const RESEND_INTERVAL_SEC: u64 = 30;

struct ActiveTransfer {
    state: TransferState,
}

struct Inner {
    queue: PendingQueue,
    active: Option<ActiveTransfer>,
}

/// Owns the send-side backlog and the single in-flight transfer.
/// Generic over the host-provided GSN binary-transfer channel.
pub struct BinaryTransfer<T: GsnBinaryChannel> {
    channel: T,
    watches: Vec<Watch>,
    /// Base directory every watch's `relative_path` is resolved against;
    /// stripped from filenames before they go out in INIT.
    root: PathBuf,
    inner: Mutex<Inner>,
    started_at: Instant,
    wait_min_for_file: Option<Duration>,
    counters: Arc<Counters>,
}

impl<T: GsnBinaryChannel> BinaryTransfer<T> {
    pub fn new(
        channel: T,
        watches: Vec<Watch>,
        root: PathBuf,
        wait_min_for_file: Option<Duration>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            channel,
            watches,
            root,
            inner: Mutex::new(Inner {
                queue: PendingQueue::new(),
                active: None,
            }),
            started_at: Instant::now(),
            wait_min_for_file,
            counters,
        }
    }

    /// `filename` relative to [`Self::root`], with `rootdir` stripped as
    /// the wire protocol requires.
    fn relative_filename(&self, path: &std::path::Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// `is_busy()` = queue non-empty OR transfer active OR the
    /// configured startup grace timer hasn't elapsed yet.
    pub async fn is_busy(&self) -> bool {
        let inner = self.inner.lock().await;
        if !inner.queue.is_empty() || inner.active.is_some() {
            return true;
        }
        if let Some(grace) = self.wait_min_for_file {
            if self.started_at.elapsed() < grace {
                return true;
            }
        }
        false
    }

    /// A filesystem-watch close-after-write event: preempts the
    /// backlog.
    pub async fn on_file_created(&self, path: PathBuf, size: u64) {
        let mut inner = self.inner.lock().await;
        inner.queue.push_head(PendingFile {
            path,
            size_at_enqueue: size,
        });
    }

    /// Seed the backlog from the startup directory scan, already
    /// sorted ascending by mtime; these join the tail, behind any
    /// watch event that arrived first.
    pub async fn seed_from_startup_scan(&self, files: Vec<PendingFile>) {
        let mut inner = self.inner.lock().await;
        for f in files {
            inner.queue.push_tail(f);
        }
    }

    /// If idle, pop the next file and send its INIT. A file of size 0
    /// is dropped (chmod 0744, closed, deleted) without sending any
    /// packet, and the next queue entry is tried instead.
    pub async fn start_next_if_idle(&self) -> Result<bool, TransferError> {
        let mut inner = self.inner.lock().await;
        if inner.active.is_some() {
            return Ok(false);
        }

        let next = loop {
            let Some(candidate) = inner.queue.pop() else {
                return Ok(false);
            };
            if candidate.size_at_enqueue == 0 {
                info!(path = %candidate.path.display(), "dropping empty file without INIT");
                if let Err(e) = drop_empty_file(&candidate.path) {
                    warn!(path = %candidate.path.display(), error = %e, "failed to drop empty file");
                }
                continue;
            }
            break candidate;
        };

        let relative = self.relative_filename(&next.path);
        let watch = select_watch(&self.watches, std::path::Path::new(&relative))?;
        let mut state = match TransferState::open_fresh(&next.path) {
            Ok(s) => s,
            Err(e) => {
                error!(path = %next.path.display(), error = %e, "failed to open file for transfer, dropping it");
                return Err(e);
            }
        };

        let mtime_ms = std::fs::metadata(&next.path)?
            .modified()
            .ok()
            .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let packet = AgentPacket::Init {
            queue_bytes: inner.queue.total_bytes(),
            queue_depth: inner.queue.len() as u32,
            resend_counter: 0,
            device_id: watch.device_id,
            mtime_ms,
            file_size: next.size_at_enqueue as u32,
            storage_kind: watch.storage_kind,
            filename: relative,
            date_format: watch.date_format.clone(),
        };
        let encoded = packet.encode();
        state.record_sent_packet(PacketType::Init, None, encoded.clone());
        inner.active = Some(ActiveTransfer { state });
        drop(inner);

        info!(path = %next.path.display(), "starting transfer, sent INIT");
        self.channel.send_packet(&encoded).await?;
        Ok(true)
    }

    /// Read the next chunk (or, at EOF, send CRC) for the active
    /// transfer.
    async fn send_next_chunk(&self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.as_mut() else {
            return Ok(());
        };

        let chunk_bytes = active.state.read_next_chunk(CHUNK_SIZE)?;
        let encoded = if chunk_bytes.is_empty() {
            let packet = AgentPacket::Crc {
                queue_bytes: inner.queue.total_bytes(),
                queue_depth: inner.queue.len() as u32,
                resend_counter: active.state.resend_counter,
                crc32: active.state.finalize_crc(),
            };
            let encoded = packet.encode();
            active
                .state
                .record_sent_packet(PacketType::Crc, None, encoded.clone());
            encoded
        } else {
            let chunk_number = active.state.chunk_number;
            let packet = AgentPacket::Chunk {
                queue_bytes: inner.queue.total_bytes(),
                queue_depth: inner.queue.len() as u32,
                resend_counter: active.state.resend_counter,
                chunk_number,
                payload: chunk_bytes,
            };
            let encoded = packet.encode();
            active.state.record_sent_packet(
                PacketType::Chunk,
                Some(chunk_number),
                encoded.clone(),
            );
            active.state.chunk_number = chunk_number.saturating_add(1);
            encoded
        };

        drop(inner);
        self.channel.send_packet(&encoded).await
    }

    /// Dispatch one decoded GSN→agent packet.
    pub async fn handle_gsn_packet(&self, bytes: &[u8]) -> Result<(), TransferError> {
        match GsnPacket::decode(bytes)? {
            GsnPacket::Init => self.handle_solicited_init().await,
            GsnPacket::Resend {
                downloaded,
                chunk_number,
                gsn_crc,
                filename,
            } => {
                self.handle_resend(downloaded, chunk_number, gsn_crc, &filename)
                    .await
            }
            GsnPacket::Ack {
                acked_type,
                chunk_number,
            } => self.handle_ack(acked_type, chunk_number).await,
        }
    }

    /// GSN solicited a new file out of nowhere. Evict any active
    /// transfer (closing it, restoring 0744) and pick the next one.
    async fn handle_solicited_init(&self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().await;
        if let Some(active) = inner.active.take() {
            warn!(
                path = %active.state.path().display(),
                chunk_number = active.state.chunk_number,
                "GSN solicited a new INIT mid-transfer, evicting active transfer"
            );
            active.state.close()?;
        }
        drop(inner);
        self.start_next_if_idle().await?;
        Ok(())
    }

    async fn handle_resend(
        &self,
        downloaded: u32,
        chunk_number: u32,
        gsn_crc: u32,
        filename: &str,
    ) -> Result<(), TransferError> {
        let path = self.root.join(filename);
        let mut inner = self.inner.lock().await;
        inner.queue.remove(&path);

        if let Some(active) = inner.active.take() {
            if active.state.path() == path.as_path() {
                active.state.close()?;
            } else {
                inner.active = Some(active);
            }
        }

        if downloaded == 0 {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            inner.queue.push_tail(PendingFile {
                path,
                size_at_enqueue: size,
            });
            drop(inner);
            self.start_next_if_idle().await?;
            return Ok(());
        }

        select_watch(&self.watches, std::path::Path::new(filename))?;
        match TransferState::open_for_resume(&path, downloaded, chunk_number, gsn_crc)? {
            ResumeOutcome::Resumed(state) => {
                inner.active = Some(ActiveTransfer { state });
                drop(inner);
                self.send_next_chunk().await
            }
            ResumeOutcome::CrcMismatch => {
                crate::state::restore_writable(&path)?;
                warn!(path = %path.display(), "resume CRC mismatch, re-enqueuing whole file");
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                inner.queue.push_tail(PendingFile {
                    path,
                    size_at_enqueue: size,
                });
                drop(inner);
                self.start_next_if_idle().await?;
                Ok(())
            }
        }
    }

    async fn handle_ack(
        &self,
        acked_type: PacketType,
        chunk_number: Option<u32>,
    ) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().await;
        let outcome = match inner.active.as_ref() {
            None => {
                debug!(?acked_type, "ack received with no active transfer, ignoring");
                return Ok(());
            }
            Some(active) => classify_ack(active.state.last_sent, acked_type, chunk_number),
        };

        match outcome {
            AckOutcome::ProceedFirstChunk => {
                if let Some(active) = inner.active.as_mut() {
                    active.state.chunk_number = 0;
                }
                drop(inner);
                self.send_next_chunk().await
            }
            AckOutcome::SendNextChunk => {
                drop(inner);
                self.send_next_chunk().await
            }
            AckOutcome::DuplicateIgnore => {
                debug!(?acked_type, ?chunk_number, "duplicate ack, ignoring");
                Ok(())
            }
            AckOutcome::ProtocolError => {
                self.counters.increment_error();
                error!(
                    ?acked_type,
                    ?chunk_number,
                    "ack does not match outstanding chunk, continuing to wait"
                );
                Ok(())
            }
            AckOutcome::FinalizeDeleteFile => {
                let Some(active) = inner.active.take() else {
                    return Ok(());
                };
                let path = active.state.path().to_path_buf();
                active.state.close()?;
                std::fs::remove_file(&path)?;
                info!(path = %path.display(), "transfer complete, file removed");
                drop(inner);
                self.start_next_if_idle().await?;
                Ok(())
            }
            AckOutcome::UnknownTreatAsReceived => {
                self.counters.increment_error();
                error!(
                    ?acked_type,
                    ?chunk_number,
                    "unexpected ack combination, treating as already received"
                );
                Ok(())
            }
        }
    }

    /// If the outstanding packet has waited past `RESEND_INTERVAL_SEC`
    /// with no matching ack, bump `resend_counter` and retransmit it.
    pub async fn resend_if_due(&self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.as_mut() else {
            return Ok(());
        };
        if active.state.last_sent.is_none() {
            return Ok(());
        }
        if active.state.last_sent_at.elapsed() < Duration::from_secs(RESEND_INTERVAL_SEC) {
            return Ok(());
        }
        let Some(bytes) = active.state.bump_resend_counter_in_last_packet() else {
            return Ok(());
        };
        drop(inner);
        info!("resend timer elapsed, retransmitting last packet");
        self.channel.send_packet(&bytes).await
    }

    /// On connection established: re-enqueue an active transfer's file
    /// at the tail with its current size, close its descriptor, and
    /// reset `last_sent`/`last_recv` (the file leaving `active` clears
    /// both implicitly, since a fresh `TransferState` carries neither).
    pub async fn on_connection_established(&self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().await;
        if let Some(active) = inner.active.take() {
            let path = active.state.path().to_path_buf();
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            active.state.close()?;
            inner.queue.push_tail(PendingFile {
                path,
                size_at_enqueue: size,
            });
        }
        Ok(())
    }

    /// On connection lost: the work loop simply pauses. No file is
    /// mutated and no state is cleared; `resend_if_due` naturally stops
    /// firing once the host stops polling it.
    pub fn on_connection_lost(&self) {}

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }
}

enum AckOutcome {
    ProceedFirstChunk,
    SendNextChunk,
    DuplicateIgnore,
    ProtocolError,
    FinalizeDeleteFile,
    UnknownTreatAsReceived,
}

/// chmod 0744 and delete a queued file that turned out to be empty,
/// without ever sending an INIT for it.
fn drop_empty_file(path: &std::path::Path) -> Result<(), TransferError> {
    restore_writable(path)?;
    std::fs::remove_file(path)?;
    Ok(())
}

fn classify_ack(
    last_sent: Option<LastSent>,
    acked_type: PacketType,
    chunk_number: Option<u32>,
) -> AckOutcome {
    match (last_sent, acked_type, chunk_number) {
        (Some(LastSent::Init), PacketType::Init, _) => AckOutcome::ProceedFirstChunk,
        (Some(LastSent::Chunk(_)), PacketType::Init, _) => AckOutcome::DuplicateIgnore,
        (Some(LastSent::Chunk(n)), PacketType::Chunk, Some(acked)) if acked == n => {
            AckOutcome::SendNextChunk
        }
        (Some(LastSent::Chunk(n)), PacketType::Chunk, Some(acked))
            if n > 0 && acked == n - 1 =>
        {
            AckOutcome::DuplicateIgnore
        }
        (Some(LastSent::Chunk(_)), PacketType::Chunk, Some(_)) => AckOutcome::ProtocolError,
        (Some(LastSent::Crc), PacketType::Chunk, _) => AckOutcome::DuplicateIgnore,
        (Some(LastSent::Crc), PacketType::Crc, _) => AckOutcome::FinalizeDeleteFile,
        (Some(LastSent::Init), PacketType::Crc, _) => AckOutcome::DuplicateIgnore,
        _ => AckOutcome::UnknownTreatAsReceived,
    }
}

/// Spawn the background resend watchdog, firing `resend_if_due` on a
/// tight tick; returns a handle that stops the task when sent to.
pub fn spawn_resend_watchdog<T>(transfer: Arc<BinaryTransfer<T>>) -> oneshot::Sender<()>
where
    T: GsnBinaryChannel + Send + Sync + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = transfer.resend_if_due().await {
                        error!(error = %e, "resend watchdog failed to retransmit");
                    }
                }
                _ = &mut shutdown_rx => return,
            }
        }
    });

    shutdown_tx
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::queue::PendingFile;
use crate::watch::Watch;
use crate::wire::{PacketType, StorageKind};
use async_trait::async_trait;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::sync::Mutex as StdMutex;
use tempfile::TempDir;

struct FakeChannel {
    sent: StdMutex<Vec<Vec<u8>>>,
}

impl FakeChannel {
    fn new() -> Self {
        Self {
            sent: StdMutex::new(Vec::new()),
        }
    }

    fn last_type(&self) -> Option<u8> {
        self.sent.lock().unwrap().last().map(|p| p[0])
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl GsnBinaryChannel for FakeChannel {
    async fn send_packet(&self, packet: &[u8]) -> Result<(), TransferError> {
        self.sent.lock().unwrap().push(packet.to_vec());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn root_watch() -> Watch {
    Watch {
        relative_path: ".".to_string(),
        storage_kind: StorageKind::Fs,
        device_id: 1,
        date_format: "%Y-%m-%d".to_string(),
    }
}

fn counters() -> Arc<Counters> {
    Arc::new(Counters::new())
}

fn ack_bytes(acked_type: PacketType, chunk_number: Option<u32>) -> Vec<u8> {
    let mut bytes = vec![PacketType::Ack as u8, acked_type as u8];
    if let Some(n) = chunk_number {
        bytes.extend_from_slice(&n.to_le_bytes());
    }
    bytes
}

fn resend_bytes(downloaded: u32, chunk_number: u32, gsn_crc: u32, filename: &str) -> Vec<u8> {
    let mut bytes = vec![PacketType::Resend as u8];
    bytes.extend_from_slice(&downloaded.to_le_bytes());
    bytes.extend_from_slice(&chunk_number.to_le_bytes());
    bytes.extend_from_slice(&gsn_crc.to_le_bytes());
    bytes.push(filename.len() as u8);
    bytes.extend_from_slice(filename.as_bytes());
    bytes
}

#[tokio::test]
async fn fresh_file_clean_transfer_sends_init_chunks_crc_and_deletes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reading.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0u8; 100_000]).unwrap();
    }

    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        dir.path().to_path_buf(),
        None,
        counters(),
    );
    transfer
        .seed_from_startup_scan(vec![PendingFile {
            path: path.clone(),
            size_at_enqueue: 100_000,
        }])
        .await;

    assert!(transfer.start_next_if_idle().await.unwrap());
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Init as u8));

    transfer
        .handle_gsn_packet(&ack_bytes(PacketType::Init, None))
        .await
        .unwrap();
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Chunk as u8));

    transfer
        .handle_gsn_packet(&ack_bytes(PacketType::Chunk, Some(0)))
        .await
        .unwrap();
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Chunk as u8));

    transfer
        .handle_gsn_packet(&ack_bytes(PacketType::Chunk, Some(1)))
        .await
        .unwrap();
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Crc as u8));

    transfer
        .handle_gsn_packet(&ack_bytes(PacketType::Crc, None))
        .await
        .unwrap();

    assert!(!path.exists());
    assert_eq!(transfer.channel.count(), 4);
}

#[tokio::test]
async fn empty_file_is_deleted_without_init_and_the_next_file_is_sent() {
    let dir = TempDir::new().unwrap();
    let empty_path = dir.path().join("empty.csv");
    std::fs::File::create(&empty_path).unwrap();
    let real_path = dir.path().join("reading.csv");
    {
        let mut f = std::fs::File::create(&real_path).unwrap();
        f.write_all(&vec![0u8; 10]).unwrap();
    }

    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        dir.path().to_path_buf(),
        None,
        counters(),
    );
    transfer
        .seed_from_startup_scan(vec![
            PendingFile {
                path: empty_path.clone(),
                size_at_enqueue: 0,
            },
            PendingFile {
                path: real_path.clone(),
                size_at_enqueue: 10,
            },
        ])
        .await;

    assert!(transfer.start_next_if_idle().await.unwrap());

    assert!(!empty_path.exists());
    assert_eq!(transfer.channel.count(), 1);
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Init as u8));
}

#[tokio::test]
async fn resume_mid_file_continues_from_offset_with_matching_crc() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reading.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0u8; 100_000]).unwrap();
    }

    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        dir.path().to_path_buf(),
        None,
        counters(),
    );

    transfer
        .handle_gsn_packet(&resend_bytes(64_000, 1, 0x1F01_A91C, "reading.csv"))
        .await
        .unwrap();

    assert_eq!(transfer.channel.last_type(), Some(PacketType::Chunk as u8));
}

#[tokio::test]
async fn resume_with_mismatched_crc_restores_writable_and_requeues() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reading.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0u8; 100_000]).unwrap();
    }

    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        dir.path().to_path_buf(),
        None,
        counters(),
    );

    transfer
        .handle_gsn_packet(&resend_bytes(64_000, 1, 0xDEAD_BEEF, "reading.csv"))
        .await
        .unwrap();

    // No chunk should have been sent; instead a fresh INIT goes out for
    // the re-enqueued file.
    assert_eq!(transfer.channel.last_type(), Some(PacketType::Init as u8));

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o744);
}

#[test]
fn classify_ack_covers_the_full_transition_table() {
    use crate::state::LastSent;

    assert!(matches!(
        classify_ack(Some(LastSent::Init), PacketType::Init, None),
        AckOutcome::ProceedFirstChunk
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Chunk(3)), PacketType::Init, None),
        AckOutcome::DuplicateIgnore
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Chunk(3)), PacketType::Chunk, Some(3)),
        AckOutcome::SendNextChunk
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Chunk(3)), PacketType::Chunk, Some(2)),
        AckOutcome::DuplicateIgnore
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Chunk(3)), PacketType::Chunk, Some(99)),
        AckOutcome::ProtocolError
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Crc), PacketType::Chunk, Some(7)),
        AckOutcome::DuplicateIgnore
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Crc), PacketType::Crc, None),
        AckOutcome::FinalizeDeleteFile
    ));
    assert!(matches!(
        classify_ack(Some(LastSent::Init), PacketType::Crc, None),
        AckOutcome::DuplicateIgnore
    ));
    assert!(matches!(
        classify_ack(None, PacketType::Init, None),
        AckOutcome::UnknownTreatAsReceived
    ));
}

#[tokio::test]
async fn is_busy_reflects_queue_and_active_transfer() {
    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        PathBuf::new(),
        None,
        counters(),
    );
    assert!(!transfer.is_busy().await);

    transfer
        .seed_from_startup_scan(vec![PendingFile {
            path: PathBuf::from("x"),
            size_at_enqueue: 1,
        }])
        .await;
    assert!(transfer.is_busy().await);
}

#[tokio::test]
async fn is_busy_honors_startup_grace_timer() {
    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        PathBuf::new(),
        Some(Duration::from_secs(3600)),
        counters(),
    );
    assert!(transfer.is_busy().await);
}

#[tokio::test]
async fn solicited_init_evicts_active_transfer_and_restores_permissions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reading.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0u8; 10]).unwrap();
    }

    let channel = FakeChannel::new();
    let transfer = BinaryTransfer::new(
        channel,
        vec![root_watch()],
        dir.path().to_path_buf(),
        None,
        counters(),
    );
    transfer
        .seed_from_startup_scan(vec![PendingFile {
            path: path.clone(),
            size_at_enqueue: 10,
        }])
        .await;
    transfer.start_next_if_idle().await.unwrap();

    let init_bytes = vec![PacketType::Init as u8];
    transfer.handle_gsn_packet(&init_bytes).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o744);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight transfer state: the open file, the running CRC, and the
//! permission discipline around it (held 0444 while transmitting,
//! always restored to 0744 before the descriptor closes).

use crate::error::TransferError;
use crate::wire::PacketType;
use crc32fast::Hasher;
use std::fs::File;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

const READ_ONLY_MODE: u32 = 0o444;
const WRITABLE_MODE: u32 = 0o744;
const RESUME_CHUNK_READ: usize = 4096;

/// The last packet type this transfer sent, with enough of its payload
/// to resolve the ack-matching table in `sender.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastSent {
    Init,
    Chunk(u32),
    Crc,
}

/// An open, in-progress transfer.
pub struct TransferState {
    path: PathBuf,
    file: File,
    pub chunk_number: u32,
    hasher: Hasher,
    pub resend_counter: u32,
    pub last_sent: Option<LastSent>,
    pub last_sent_at: Instant,
    /// Raw encoded bytes of the last packet sent, kept so a RESEND-timer
    /// retransmit can patch in a bumped `resend_counter` without
    /// re-reading the file (the CHUNK cursor has already moved past it).
    last_packet_bytes: Option<Vec<u8>>,
}

impl TransferState {
    /// Open `path` fresh for transfer: chmod 0444, hasher reset.
    pub fn open_fresh(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        set_mode(path, READ_ONLY_MODE)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            chunk_number: 0,
            hasher: Hasher::new(),
            resend_counter: 0,
            last_sent: None,
            last_sent_at: Instant::now(),
            last_packet_bytes: None,
        })
    }

    /// Open `path` resuming at a RESEND offset: CRC the first
    /// `downloaded` bytes in small reads and compare against
    /// `expected_crc`. On mismatch the caller must restore 0744 and
    /// re-enqueue the whole file; this method itself leaves the file in
    /// 0444 so the caller's failure path has a single place to restore
    /// permissions.
    pub fn open_for_resume(
        path: &Path,
        downloaded: u32,
        chunk_number: u32,
        expected_crc: u32,
    ) -> Result<ResumeOutcome, TransferError> {
        let mut file = File::open(path)?;
        set_mode(path, READ_ONLY_MODE)?;

        let mut hasher = Hasher::new();
        let mut remaining = downloaded as u64;
        let mut buf = [0u8; RESUME_CHUNK_READ];
        while remaining > 0 {
            let want = remaining.min(RESUME_CHUNK_READ as u64) as usize;
            file.read_exact(&mut buf[..want])?;
            hasher.update(&buf[..want]);
            remaining -= want as u64;
        }

        if hasher.clone().finalize() != expected_crc {
            return Ok(ResumeOutcome::CrcMismatch);
        }

        Ok(ResumeOutcome::Resumed(Self {
            path: path.to_path_buf(),
            file,
            chunk_number,
            hasher,
            resend_counter: 0,
            last_sent: None,
            last_sent_at: Instant::now(),
            last_packet_bytes: None,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read up to `CHUNK_SIZE` bytes, folding them into the running
    /// CRC. Returns an empty vec at EOF.
    pub fn read_next_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, TransferError> {
        let mut buf = vec![0u8; max_len];
        let mut total = 0;
        loop {
            let n = self.file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
            if total == max_len {
                break;
            }
        }
        buf.truncate(total);
        self.hasher.update(&buf);
        Ok(buf)
    }

    pub fn finalize_crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn record_sent(&mut self, acked_type: PacketType, chunk_number: Option<u32>) {
        self.last_sent = Some(match acked_type {
            PacketType::Init => LastSent::Init,
            PacketType::Chunk => LastSent::Chunk(chunk_number.unwrap_or(self.chunk_number)),
            PacketType::Crc => LastSent::Crc,
            PacketType::Ack | PacketType::Resend => {
                unreachable!("sender never records an ack/resend as its own last-sent type")
            }
        });
    }

    /// Record that `bytes` was just transmitted as `acked_type`, keeping
    /// a copy so a later resend-timeout retransmit can patch in a new
    /// `resend_counter` without touching the file.
    pub fn record_sent_packet(
        &mut self,
        acked_type: PacketType,
        chunk_number: Option<u32>,
        bytes: Vec<u8>,
    ) {
        self.record_sent(acked_type, chunk_number);
        self.last_sent_at = Instant::now();
        self.last_packet_bytes = Some(bytes);
    }

    /// Bump `resend_counter`, patch it into the cached last-sent packet
    /// (offset 13..17, right after the shared tag+queue_bytes+queue_depth
    /// prefix every agent→GSN packet carries), and return the bytes to
    /// retransmit.
    pub fn bump_resend_counter_in_last_packet(&mut self) -> Option<Vec<u8>> {
        self.resend_counter = self.resend_counter.wrapping_add(1);
        let bytes = self.last_packet_bytes.as_mut()?;
        bytes[13..17].copy_from_slice(&self.resend_counter.to_le_bytes());
        self.last_sent_at = Instant::now();
        Some(bytes.clone())
    }

    /// Close the transfer, restoring 0744 first regardless of outcome.
    /// Called on every exit path: success, connection loss,
    /// resume-rejection, or stop.
    pub fn close(self) -> Result<(), TransferError> {
        set_mode(&self.path, WRITABLE_MODE)?;
        drop(self.file);
        Ok(())
    }
}

pub enum ResumeOutcome {
    Resumed(TransferState),
    CrcMismatch,
}

fn set_mode(path: &Path, mode: u32) -> Result<(), TransferError> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

/// Restore 0744 on a path whose `TransferState` was dropped without
/// going through [`TransferState::close`] (e.g. resume CRC mismatch).
pub fn restore_writable(path: &Path) -> Result<(), TransferError> {
    set_mode(path, WRITABLE_MODE)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn file_with(bytes: &[u8]) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    f
}

fn mode_of(path: &Path) -> u32 {
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[test]
fn open_fresh_sets_read_only_mode() {
    let f = file_with(&[0u8; 100]);
    let state = TransferState::open_fresh(f.path()).unwrap();
    assert_eq!(mode_of(f.path()), READ_ONLY_MODE);
    state.close().unwrap();
    assert_eq!(mode_of(f.path()), WRITABLE_MODE);
}

#[test]
fn reading_chunks_accumulates_crc_matching_known_vector() {
    // CRC-32 (zlib) of 100,000 zero bytes is 0x5D40E3A1.
    let f = file_with(&vec![0u8; 100_000]);
    let mut state = TransferState::open_fresh(f.path()).unwrap();
    loop {
        let chunk = state.read_next_chunk(crate::wire::CHUNK_SIZE).unwrap();
        if chunk.is_empty() {
            break;
        }
    }
    assert_eq!(state.finalize_crc(), 0x5D40_E3A1);
    state.close().unwrap();
}

#[test]
fn resume_with_matching_crc_continues_from_offset() {
    let f = file_with(&vec![0u8; 100_000]);
    // CRC-32 (zlib) of the first 64,000 zero bytes is 0x1F01A91C.
    let outcome = TransferState::open_for_resume(f.path(), 64_000, 1, 0x1F01_A91C).unwrap();
    let mut state = match outcome {
        ResumeOutcome::Resumed(s) => s,
        ResumeOutcome::CrcMismatch => panic!("expected CRC match"),
    };
    assert_eq!(state.chunk_number, 1);
    let rest = state.read_next_chunk(crate::wire::CHUNK_SIZE).unwrap();
    assert_eq!(rest.len(), 36_000);
    assert_eq!(state.finalize_crc(), 0x5D40_E3A1);
    state.close().unwrap();
}

#[test]
fn resume_with_mismatched_crc_reports_mismatch_and_leaves_file_read_only() {
    let f = file_with(&vec![0u8; 100_000]);
    let outcome = TransferState::open_for_resume(f.path(), 64_000, 1, 0xDEAD_BEEF).unwrap();
    assert!(matches!(outcome, ResumeOutcome::CrcMismatch));
    assert_eq!(mode_of(f.path()), READ_ONLY_MODE);
    restore_writable(f.path()).unwrap();
    assert_eq!(mode_of(f.path()), WRITABLE_MODE);
}

#[test]
fn record_sent_packet_tracks_last_sent_chunk_number() {
    let f = file_with(&[0u8; 10]);
    let mut state = TransferState::open_fresh(f.path()).unwrap();
    state.record_sent_packet(PacketType::Chunk, Some(4), vec![0u8; 21]);
    assert_eq!(state.last_sent, Some(LastSent::Chunk(4)));
    state.close().unwrap();
}

#[test]
fn bump_resend_counter_patches_cached_packet_bytes() {
    let f = file_with(&[0u8; 10]);
    let mut state = TransferState::open_fresh(f.path()).unwrap();
    let mut bytes = vec![0u8; 21];
    bytes[13..17].copy_from_slice(&0u32.to_le_bytes());
    state.record_sent_packet(PacketType::Chunk, Some(0), bytes);
    let resent = state.bump_resend_counter_in_last_packet().unwrap();
    let counter = u32::from_le_bytes(resent[13..17].try_into().unwrap());
    assert_eq!(counter, 1);
    state.close().unwrap();
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bl-transfer: watches configured directories for files to ship to
//! GSN over the binary transfer protocol, one file in flight at a
//! time.

pub mod error;
pub mod queue;
pub mod sender;
pub mod state;
pub mod transport;
pub mod watch;
pub mod watcher;
pub mod wire;

pub use error::TransferError;
pub use queue::{PendingFile, PendingQueue};
pub use sender::{spawn_resend_watchdog, BinaryTransfer, RESEND_INTERVAL_SEC};
pub use transport::GsnBinaryChannel;
pub use watch::{select_watch, Watch};
pub use watcher::{scan_startup_files, spawn_watcher};
pub use wire::{AgentPacket, GsnPacket, PacketType, StorageKind, CHUNK_SIZE};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The GSN binary-transfer peer is a named collaborator, not part of
//! this crate: the host process owns the actual connection and hands
//! packet bytes to [`BinaryTransfer`](crate::sender::BinaryTransfer)
//! through this port.

use crate::error::TransferError;
use async_trait::async_trait;

#[async_trait]
pub trait GsnBinaryChannel: Send + Sync {
    /// Send one already-encoded agent→GSN packet.
    async fn send_packet(&self, packet: &[u8]) -> Result<(), TransferError>;

    /// True while the GSN binary-transfer connection is up.
    fn is_connected(&self) -> bool;
}

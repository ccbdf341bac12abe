// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The TOS serial peer is a named collaborator, not part of this crate:
//! the host process owns the actual serial/radio link and hands packet
//! bytes to [`TosLink`](crate::link::TosLink) through this port.

use crate::error::TosError;
use async_trait::async_trait;

#[async_trait]
pub trait TosTransport: Send + Sync {
    /// Send one already-encoded control-command packet.
    async fn send_packet(&self, packet: &[u8]) -> Result<(), TosError>;
}

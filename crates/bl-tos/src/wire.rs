// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The TOS control-command packet: a single command byte followed by a
//! little-endian `u32` argument. Command codes are this crate's own
//! convention (assigned in declaration order below) — the original
//! TinyOS message IDs aren't part of the retrieved source, only their
//! symbolic names and argument semantics.

use crate::error::TosError;

/// Value of `SERVICE_WINDOW`'s argument that disables the service
/// window rather than scheduling one `seconds` from now.
pub const SERVICE_WINDOW_DISABLE: u32 = 0xFFFF_FFFF;

/// A command sent from the agent to the TOS node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TosCommand {
    WakeupQuery,
    /// Seconds until the next service window, or [`SERVICE_WINDOW_DISABLE`].
    ServiceWindow(u32),
    /// Seconds until the next scheduled wake-up.
    NextWakeup(u32),
    /// Seconds from now at which the node should cut power.
    Shutdown(u32),
    /// Watchdog timeout, in seconds, to arm until the next reset.
    ResetWatchdog(u32),
    NetStatus,
}

impl TosCommand {
    pub fn code(self) -> u8 {
        match self {
            TosCommand::WakeupQuery => 0,
            TosCommand::ServiceWindow(_) => 1,
            TosCommand::NextWakeup(_) => 2,
            TosCommand::Shutdown(_) => 3,
            TosCommand::ResetWatchdog(_) => 4,
            TosCommand::NetStatus => 5,
        }
    }

    pub fn argument(self) -> u32 {
        match self {
            TosCommand::WakeupQuery | TosCommand::NetStatus => 0,
            TosCommand::ServiceWindow(v)
            | TosCommand::NextWakeup(v)
            | TosCommand::Shutdown(v)
            | TosCommand::ResetWatchdog(v) => v,
        }
    }
}

pub const PING_INTERVAL_SEC: u64 = 60;
pub const WATCHDOG_TIMEOUT_SEC: u32 = 300;

/// Encode a command as the 5-byte wire packet.
pub fn encode_command(cmd: TosCommand) -> [u8; 5] {
    let mut buf = [0u8; 5];
    buf[0] = cmd.code();
    buf[1..5].copy_from_slice(&cmd.argument().to_le_bytes());
    buf
}

/// Decode a raw incoming packet into its command code and argument.
/// Unlike [`TosCommand`], this accepts any command byte — an incoming
/// packet may be an ack, a spontaneous status update, or a command the
/// agent never sends itself.
pub fn decode_packet(bytes: &[u8]) -> Result<(u8, u32), TosError> {
    if bytes.len() < 5 {
        return Err(TosError::ShortPacket { len: bytes.len() });
    }
    let command = bytes[0];
    let mut argument_bytes = [0u8; 4];
    argument_bytes.copy_from_slice(&bytes[1..5]);
    Ok((command, u32::from_le_bytes(argument_bytes)))
}

/// Bitset carried as the argument of a `WAKEUP_QUERY` response.
pub const WAKEUP_SCHEDULED: u32 = 0x01;
pub const WAKEUP_SERVICE: u32 = 0x02;
pub const WAKEUP_BEACON: u32 = 0x04;
pub const WAKEUP_NODE_REBOOT: u32 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeWakeupFlags(pub u32);

impl NodeWakeupFlags {
    pub fn is_scheduled(self) -> bool {
        self.0 & WAKEUP_SCHEDULED != 0
    }

    pub fn is_service(self) -> bool {
        self.0 & WAKEUP_SERVICE != 0
    }

    pub fn is_beacon(self) -> bool {
        self.0 & WAKEUP_BEACON != 0
    }

    pub fn is_node_reboot(self) -> bool {
        self.0 & WAKEUP_NODE_REBOOT != 0
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

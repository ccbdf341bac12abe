// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op and fake implementations of the collaborators spec.md treats
//! as out of scope (§1): the GSN schedule/binary-transfer peers, the
//! TOS serial transport, and the plugin registry. The no-ops back the
//! binary's standalone demo mode; the fakes record calls for tests.

use async_trait::async_trait;
use bl_engine::{GsnPeer, HandlerError, PluginRegistry, ScheduleResponse};
use bl_transfer::GsnBinaryChannel;
use bl_tos::TosTransport;
use parking_lot::Mutex;
use tracing::info;

/// GSN peer that never connects and never supplies a schedule — the
/// agent runs entirely on whatever schedule was already persisted.
#[derive(Debug, Default)]
pub struct NoopGsnPeer;

#[async_trait]
impl GsnPeer for NoopGsnPeer {
    fn is_connected(&self) -> bool {
        false
    }

    async fn poll_schedule(&self, _creation_time_ms: i64) -> Option<ScheduleResponse> {
        None
    }

    async fn echo_schedule(&self, _origin: &str, _text: &str, _creation_time_ms: i64) {}
}

/// Plugin registry that logs and succeeds every invocation, for demo
/// runs with no real plugins wired in.
#[derive(Debug, Default)]
pub struct NoopPluginRegistry;

#[async_trait]
impl PluginRegistry for NoopPluginRegistry {
    async fn invoke(
        &self,
        class_name: &str,
        command: &str,
        max_runtime_minutes: Option<u32>,
        min_runtime_minutes: Option<u32>,
    ) -> Result<(), HandlerError> {
        info!(class_name, command, ?max_runtime_minutes, ?min_runtime_minutes, "noop plugin invocation");
        Ok(())
    }
}

/// GSN binary-transfer channel that accepts every packet and reports
/// itself disconnected, so `BinaryTransfer` simply accumulates its
/// backlog without attempting to send.
#[derive(Debug, Default)]
pub struct NoopGsnChannel;

#[async_trait]
impl GsnBinaryChannel for NoopGsnChannel {
    async fn send_packet(&self, _packet: &[u8]) -> Result<(), bl_transfer::TransferError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// TOS transport that accepts every command without ever acking one;
/// `TosLink::send` reports failure after its retry budget.
#[derive(Debug, Default)]
pub struct NoopTosTransport;

#[async_trait]
impl TosTransport for NoopTosTransport {
    async fn send_packet(&self, _packet: &[u8]) -> Result<(), bl_tos::TosError> {
        Ok(())
    }
}

/// Records every invocation handed to it, for assertions in tests that
/// exercise `ScheduleHandler` against a real plugin registry port.
#[derive(Debug, Default)]
pub struct FakePluginRegistry {
    invocations: Mutex<Vec<(String, String)>>,
}

impl FakePluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<(String, String)> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl PluginRegistry for FakePluginRegistry {
    async fn invoke(
        &self,
        class_name: &str,
        command: &str,
        _max_runtime_minutes: Option<u32>,
        _min_runtime_minutes: Option<u32>,
    ) -> Result<(), HandlerError> {
        self.invocations.lock().push((class_name.to_string(), command.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "fakes_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn noop_gsn_peer_never_connects_or_supplies_a_schedule() {
    let peer = NoopGsnPeer;
    assert!(!peer.is_connected());
    assert!(peer.poll_schedule(0).await.is_none());
}

#[tokio::test]
async fn fake_plugin_registry_records_invocations() {
    let registry = FakePluginRegistry::new();
    registry.invoke("Alpha", "cmd", None, None).await.unwrap();
    assert_eq!(registry.invocations(), vec![("Alpha".to_string(), "cmd".to_string())]);
}

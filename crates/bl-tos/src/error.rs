// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TosError {
    #[error("TOS packet too short: {len} bytes, need at least 5")]
    ShortPacket { len: usize },
    #[error("TOS transport failed: {0}")]
    Transport(String),
}

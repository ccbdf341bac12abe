// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire encoding for the binary transfer protocol: a single packet-type
//! byte followed by type-specific fields, all multi-byte integers
//! little-endian. Strings are length-prefixed with a single `u8` (every
//! string field this protocol carries is already truncated to ≤255
//! bytes); the `CHUNK` payload is length-prefixed with a `u32` since it
//! can be as large as `CHUNK_SIZE`.

use crate::error::TransferError;

pub const CHUNK_SIZE: usize = 64_000;

/// Single-byte packet type tag shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Ack = 0,
    Init = 1,
    Resend = 2,
    Chunk = 3,
    Crc = 4,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Result<Self, TransferError> {
        match v {
            0 => Ok(PacketType::Ack),
            1 => Ok(PacketType::Init),
            2 => Ok(PacketType::Resend),
            3 => Ok(PacketType::Chunk),
            4 => Ok(PacketType::Crc),
            other => Err(TransferError::Malformed(format!(
                "unknown packet type byte {other}"
            ))),
        }
    }
}

/// File storage kind, carried in `INIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageKind {
    Fs = 0,
    Db = 1,
}

/// Packets the agent sends to GSN.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPacket {
    Init {
        queue_bytes: u64,
        queue_depth: u32,
        resend_counter: u32,
        device_id: u32,
        mtime_ms: i64,
        file_size: u32,
        storage_kind: StorageKind,
        filename: String,
        date_format: String,
    },
    Chunk {
        queue_bytes: u64,
        queue_depth: u32,
        resend_counter: u32,
        chunk_number: u32,
        payload: Vec<u8>,
    },
    Crc {
        queue_bytes: u64,
        queue_depth: u32,
        resend_counter: u32,
        crc32: u32,
    },
    /// `chunk_number` is only meaningful when acking a `CHUNK`.
    Ack {
        acked_type: PacketType,
        chunk_number: Option<u32>,
    },
}

impl AgentPacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            AgentPacket::Init {
                queue_bytes,
                queue_depth,
                resend_counter,
                device_id,
                mtime_ms,
                file_size,
                storage_kind,
                filename,
                date_format,
            } => {
                buf.push(PacketType::Init as u8);
                buf.extend_from_slice(&queue_bytes.to_le_bytes());
                buf.extend_from_slice(&queue_depth.to_le_bytes());
                buf.extend_from_slice(&resend_counter.to_le_bytes());
                buf.extend_from_slice(&device_id.to_le_bytes());
                buf.extend_from_slice(&mtime_ms.to_le_bytes());
                buf.extend_from_slice(&file_size.to_le_bytes());
                buf.push(*storage_kind as u8);
                push_short_string(&mut buf, filename);
                push_short_string(&mut buf, date_format);
            }
            AgentPacket::Chunk {
                queue_bytes,
                queue_depth,
                resend_counter,
                chunk_number,
                payload,
            } => {
                buf.push(PacketType::Chunk as u8);
                buf.extend_from_slice(&queue_bytes.to_le_bytes());
                buf.extend_from_slice(&queue_depth.to_le_bytes());
                buf.extend_from_slice(&resend_counter.to_le_bytes());
                buf.extend_from_slice(&chunk_number.to_le_bytes());
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }
            AgentPacket::Crc {
                queue_bytes,
                queue_depth,
                resend_counter,
                crc32,
            } => {
                buf.push(PacketType::Crc as u8);
                buf.extend_from_slice(&queue_bytes.to_le_bytes());
                buf.extend_from_slice(&queue_depth.to_le_bytes());
                buf.extend_from_slice(&resend_counter.to_le_bytes());
                buf.extend_from_slice(&crc32.to_le_bytes());
            }
            AgentPacket::Ack {
                acked_type,
                chunk_number,
            } => {
                buf.push(PacketType::Ack as u8);
                buf.push(*acked_type as u8);
                if *acked_type == PacketType::Chunk {
                    buf.extend_from_slice(&chunk_number.unwrap_or(0).to_le_bytes());
                }
            }
        }
        buf
    }
}

/// Packets GSN sends to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum GsnPacket {
    /// Out-of-nowhere solicitation: GSN wants a new file.
    Init,
    Resend {
        downloaded: u32,
        chunk_number: u32,
        gsn_crc: u32,
        filename: String,
    },
    Ack {
        acked_type: PacketType,
        chunk_number: Option<u32>,
    },
}

impl GsnPacket {
    pub fn decode(bytes: &[u8]) -> Result<Self, TransferError> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| TransferError::Malformed("empty packet".to_string()))?;
        match PacketType::from_u8(tag)? {
            PacketType::Init => Ok(GsnPacket::Init),
            PacketType::Resend => {
                let mut r = Reader::new(rest);
                let downloaded = r.read_u32()?;
                let chunk_number = r.read_u32()?;
                let gsn_crc = r.read_u32()?;
                let filename = r.read_short_string()?;
                Ok(GsnPacket::Resend {
                    downloaded,
                    chunk_number,
                    gsn_crc,
                    filename,
                })
            }
            PacketType::Ack => {
                let mut r = Reader::new(rest);
                let acked_type = PacketType::from_u8(r.read_u8()?)?;
                let chunk_number = if acked_type == PacketType::Chunk {
                    Some(r.read_u32()?)
                } else {
                    None
                };
                Ok(GsnPacket::Ack {
                    acked_type,
                    chunk_number,
                })
            }
            other => Err(TransferError::Malformed(format!(
                "GSN does not send packet type {other:?} to the agent"
            ))),
        }
    }
}

fn push_short_string(buf: &mut Vec<u8>, s: &str) {
    let truncated = truncate_to_bytes(s, 255);
    buf.push(truncated.len() as u8);
    buf.extend_from_slice(truncated.as_bytes());
}

/// Truncate `s` to at most `max_bytes` bytes without splitting a UTF-8
/// code point.
pub fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransferError> {
        if self.pos + n > self.bytes.len() {
            return Err(TransferError::Malformed("packet truncated".to_string()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, TransferError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, TransferError> {
        let slice = self.take(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(slice);
        Ok(u32::from_le_bytes(arr))
    }

    fn read_short_string(&mut self) -> Result<String, TransferError> {
        let len = self.read_u8()? as usize;
        let slice = self.take(len)?;
        String::from_utf8(slice.to_vec())
            .map_err(|e| TransferError::Malformed(format!("invalid UTF-8 string: {e}")))
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

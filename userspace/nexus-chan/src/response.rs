// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Response metadata/body reads and channel closure classification
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/properties.rs (closure classification totality)

use alloc::vec::Vec;
use core::fmt;

use log::{error, info};
use nexus_hostcall::{closure, ChannelHandle, HostError, HostRuntime, HttpResult};

use crate::error::ChanError;

/// HTTP status that carries a payload.
pub const STATUS_OK: u32 = 200;
/// HTTP status that triggers the caller's not-found policy.
pub const STATUS_NOT_FOUND: u32 = 404;

/// Successful interpretations of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// 200 with a readable body.
    Success {
        /// Number of response headers.
        header_count: u32,
        /// Complete body, `body_length` bytes.
        payload: Vec<u8>,
    },
    /// 200 whose body could not be copied out. Always [`ChanError::BodyReadFailed`].
    SuccessBodyUnreadable(ChanError),
    /// 404.
    NotFound,
}

/// Coarse reason a channel was dropped by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClosureClass {
    /// Peer closed cleanly.
    ServerClosed,
    /// Peer reset the connection.
    ServerReset,
    /// The network went away.
    NetworkDisconnected,
    /// TLS, DNS or TCP connect failure.
    TransportError,
    /// Anything else, including a failed reason query.
    Unknown,
}

impl ClosureClass {
    /// Maps a raw closure code. Total: unknown codes map to `Unknown`.
    pub fn classify(raw: u32) -> Self {
        match raw {
            closure::PEER_CLOSED => ClosureClass::ServerClosed,
            closure::PEER_RESET => ClosureClass::ServerReset,
            closure::NETWORK_DOWN | closure::NETWORK_RELEASED => ClosureClass::NetworkDisconnected,
            closure::TLS_HANDSHAKE_FAILED
            | closure::TLS_ALERT
            | closure::DNS_FAILED
            | closure::CONNECT_FAILED => ClosureClass::TransportError,
            _ => ClosureClass::Unknown,
        }
    }
}

impl fmt::Display for ClosureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClosureClass::ServerClosed => "server closed the connection",
            ClosureClass::ServerReset => "server reset the connection",
            ClosureClass::NetworkDisconnected => "network disconnected",
            ClosureClass::TransportError => "transport error",
            ClosureClass::Unknown => "unknown",
        })
    }
}

/// Reads and interprets whatever the host holds for a channel.
#[derive(Clone, Copy, Debug)]
pub struct ResponseProcessor {
    chunk_bytes: usize,
}

impl ResponseProcessor {
    /// Body reads fetch at most `chunk_bytes` per host call.
    pub fn new(chunk_bytes: usize) -> Self {
        Self { chunk_bytes: chunk_bytes.max(1) }
    }

    /// Reads metadata and, for a 200, the full body.
    pub fn process<H: HostRuntime>(
        &self,
        host: &mut H,
        channel: ChannelHandle,
    ) -> Result<ResponseOutcome, ChanError> {
        let meta = host.read_response_metadata(channel).map_err(|status| {
            error!("response data read failed (status: {})", status.code());
            ChanError::MetadataReadFailed(status)
        })?;
        if meta.result != HttpResult::Ok {
            error!("HTTP request failed (result: {})", meta.result.raw());
            return Err(ChanError::RequestFailed(meta.result));
        }
        match meta.status_code {
            STATUS_OK => {
                info!(
                    "HTTP response header count: {}, body length: {}",
                    meta.header_count, meta.body_length
                );
                match self.read_body(host, channel, meta.body_length) {
                    Ok(payload) => {
                        Ok(ResponseOutcome::Success { header_count: meta.header_count, payload })
                    }
                    Err(status) => {
                        error!("HTTP response body read status {}", status.code());
                        let err = ChanError::BodyReadFailed(status);
                        Ok(ResponseOutcome::SuccessBodyUnreadable(err))
                    }
                }
            }
            STATUS_NOT_FOUND => {
                info!("HTTP response status 404");
                Ok(ResponseOutcome::NotFound)
            }
            other => {
                error!("unexpected HTTP status code: {other}");
                Err(ChanError::UnexpectedStatus(other))
            }
        }
    }

    /// Copies `length` body bytes out of the host in chunks.
    pub fn read_body<H: HostRuntime>(
        &self,
        host: &mut H,
        channel: ChannelHandle,
        length: u32,
    ) -> Result<Vec<u8>, HostError> {
        let total = length as usize;
        let mut payload = Vec::new();
        payload.try_reserve_exact(total).map_err(|_| HostError::Exhausted)?;
        payload.resize(total, 0);
        let mut offset = 0usize;
        for chunk in payload.chunks_mut(self.chunk_bytes) {
            let at = u32::try_from(offset).map_err(|_| HostError::InvalidParameter)?;
            host.read_response_body(channel, at, chunk)?;
            offset += chunk.len();
        }
        Ok(payload)
    }

    /// Asks the host why `channel` was dropped.
    pub fn closure_reason<H: HostRuntime>(
        &self,
        host: &mut H,
        channel: ChannelHandle,
    ) -> ClosureClass {
        match host.get_closure_reason(channel) {
            Ok(raw) => {
                let class = ClosureClass::classify(raw);
                error!("channel closed for reason: {class} (code {raw})");
                class
            }
            Err(status) => {
                error!("channel closed for unknown reason (status: {})", status.code());
                ClosureClass::Unknown
            }
        }
    }
}

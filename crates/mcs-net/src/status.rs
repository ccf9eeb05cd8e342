//! ---
//! mcs_section: "05-networking-external-interfaces"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Network connectivity to the managed game server."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::time::Duration;

use bytes::{Buf, BytesMut};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::codec;
use crate::{ProbeError, Result};

/// Protocol version sent in the handshake; servers answer status requests for any version.
pub const STATUS_PROTOCOL_VERSION: i32 = 47;
const NEXT_STATE_STATUS: i32 = 1;
const STATUS_PACKET_ID: i32 = 0x00;

/// Decoded status response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerStatus {
    #[serde(default)]
    pub version: Option<ServerVersion>,
    pub players: Players,
    #[serde(default)]
    pub description: Value,
}

impl ServerStatus {
    pub fn online_players(&self) -> u32 {
        self.players.online
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Players {
    pub online: u32,
    pub max: u32,
}

/// Status client bounded by a per-phase timeout (connect, then exchange).
#[derive(Debug, Clone)]
pub struct JavaStatusClient {
    timeout: Duration,
}

impl JavaStatusClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a connection to `host:port` and request the server status.
    pub async fn query(&self, host: &str, port: u16) -> Result<ServerStatus> {
        let addr = format!("{host}:{port}");
        let mut stream = match timeout(self.timeout, TcpStream::connect(addr.as_str())).await {
            Err(_) => {
                return Err(ProbeError::Timeout {
                    addr,
                    timeout: self.timeout,
                })
            }
            Ok(Err(source)) => return Err(ProbeError::Connect { addr, source }),
            Ok(Ok(stream)) => stream,
        };
        debug!(%addr, "status connection established");

        match timeout(self.timeout, exchange(&mut stream, host, port)).await {
            Err(_) => Err(ProbeError::Timeout {
                addr,
                timeout: self.timeout,
            }),
            Ok(result) => result,
        }
    }
}

async fn exchange(stream: &mut TcpStream, host: &str, port: u16) -> Result<ServerStatus> {
    let mut request = codec::handshake(STATUS_PROTOCOL_VERSION, host, port, NEXT_STATE_STATUS);
    let status_request: BytesMut = codec::frame(STATUS_PACKET_ID, &[]);
    request.extend_from_slice(&status_request);
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut response = codec::read_frame(stream).await?;
    let packet_id = codec::get_varint(&mut response)?;
    if packet_id != STATUS_PACKET_ID {
        return Err(ProbeError::Protocol(format!(
            "expected status response packet 0x00, got {packet_id:#04x}"
        )));
    }
    let payload = codec::get_string(&mut response)?;
    if response.has_remaining() {
        debug!(
            trailing = response.remaining(),
            "ignoring trailing bytes in status response"
        );
    }
    Ok(serde_json::from_str(&payload)?)
}

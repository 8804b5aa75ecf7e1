//! Peer connections for the generic pool

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use chat_common::pool::{Connector, PoolError};

use crate::protocol::{Frame, FrameCodec, FrameError, MsgId, ProtocolVariant};

/// A framed TCP connection speaking the peer variant
pub type PeerConnection = Framed<TcpStream, FrameCodec>;

/// Opens connections to one peer node
#[derive(Debug, Clone)]
pub struct PeerConnector {
    name: String,
    address: String,
    max_body_length: usize,
}

impl PeerConnector {
    pub fn new(name: impl Into<String>, address: impl Into<String>, max_body_length: usize) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            max_body_length,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Send `request` and wait for the first frame with `response_id`
///
/// Frames with other ids are skipped; they belong to requests whose
/// caller gave up earlier.
pub(crate) async fn exchange(
    conn: &mut PeerConnection,
    request: Frame,
    response_id: u32,
) -> Result<Frame, FrameError> {
    conn.send(request).await?;
    loop {
        match conn.next().await {
            Some(Ok(frame)) if frame.msg_id == response_id => return Ok(frame),
            Some(Ok(frame)) => {
                tracing::trace!(msg_id = frame.msg_id, expected = response_id, "Skipping stale peer frame");
            }
            Some(Err(e)) => return Err(e),
            None => return Err(FrameError::ConnectionClosed),
        }
    }
}

#[async_trait]
impl Connector for PeerConnector {
    type Connection = PeerConnection;

    fn target(&self) -> String {
        format!("{}@{}", self.name, self.address)
    }

    async fn connect(&self) -> Result<PeerConnection, PoolError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| PoolError::Connect {
                target: self.target(),
                reason: e.to_string(),
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %self.name, error = %e, "Failed to set TCP_NODELAY");
        }
        Ok(Framed::new(
            stream,
            FrameCodec::new(ProtocolVariant::Peer, self.max_body_length),
        ))
    }

    async fn ping(&self, conn: &mut PeerConnection) -> Result<(), PoolError> {
        let request = Frame::from_value(MsgId::HeartbeatReq, &json!({}));
        exchange(conn, request, MsgId::HeartbeatRsp.as_u32())
            .await
            .map(|_| ())
            .map_err(|e| PoolError::HealthCheck(e.to_string()))
    }
}

//! Framed protocol client

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use chat_node::{Frame, FrameCodec, MsgId, ProtocolVariant};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// How long a test waits for an expected frame
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A client connection speaking the standard header variant
pub struct TestClient {
    framed: Framed<TcpStream, FrameCodec>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new(ProtocolVariant::Standard, 65_536)),
        })
    }

    /// Send raw bytes as the body of `msg_id`
    pub async fn send_raw(&mut self, msg_id: u32, body: impl Into<Vec<u8>>) -> Result<()> {
        self.framed.send(Frame::new(msg_id, body.into())).await?;
        Ok(())
    }

    pub async fn send(&mut self, msg_id: impl Into<u32>, body: &Value) -> Result<()> {
        self.framed.send(Frame::from_value(msg_id, body)).await?;
        Ok(())
    }

    /// Next frame as `(msg_id, body)`
    pub async fn recv(&mut self) -> Result<(u32, Value)> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(frame))) => Ok((frame.msg_id, frame.body_json()?)),
            Ok(Some(Err(e))) => bail!("read failed: {e}"),
            Ok(None) => bail!("connection closed"),
            Err(_) => bail!("timed out waiting for a frame"),
        }
    }

    /// Next frame, which must carry `msg_id`
    pub async fn expect(&mut self, msg_id: impl Into<u32>) -> Result<Value> {
        let expected = msg_id.into();
        let (id, body) = self.recv().await?;
        if id != expected {
            bail!("expected message {expected}, got {id}: {body}");
        }
        Ok(body)
    }

    /// Next frame if one arrives within `wait`
    pub async fn try_recv(&mut self, wait: Duration) -> Option<(u32, Value)> {
        match tokio::time::timeout(wait, self.framed.next()).await {
            Ok(Some(Ok(frame))) => Some((frame.msg_id, frame.body_json().ok()?)),
            _ => None,
        }
    }

    /// Whether the server closed the connection within `wait`
    pub async fn closed_within(&mut self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.framed.next()).await {
                Ok(None | Some(Err(_))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: MsgId, response: MsgId, body: &Value) -> Result<Value> {
        self.send(request, body).await?;
        self.expect(response).await
    }

    /// Log in, creating or replacing the user's profile
    pub async fn login(&mut self, uid: u64, name: &str) -> Result<Value> {
        self.request(
            MsgId::LoginReq,
            MsgId::LoginRsp,
            &json!({ "uid": uid, "init": true, "name": name, "nick": name }),
        )
        .await
    }

    /// Acknowledge `seq` and wait for the confirmation
    pub async fn ack(&mut self, seq: &Value) -> Result<Value> {
        self.request(MsgId::AckReq, MsgId::AckRsp, &json!({ "seq": seq }))
            .await
    }
}

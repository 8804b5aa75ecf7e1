//! Session - one framed connection with its send queue and receive loop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chat_core::UserId;

use crate::protocol::{
    ConnectionState, Frame, FrameCodec, FrameError, ProtocolVariant, StateCell,
};

/// How long a closing session may spend flushing queued frames
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

type BoxedStream = Box<dyn ByteStream + Send + Unpin>;
type Reader = FramedRead<ReadHalf<BoxedStream>, FrameCodec>;
type Writer = FramedWrite<WriteHalf<BoxedStream>, FrameCodec>;

/// Byte stream a session can run on
pub trait ByteStream: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> ByteStream for T {}

/// Per-session settings
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub variant: ProtocolVariant,
    pub max_body_length: usize,
    /// Frames queued beyond this are dropped
    pub send_queue_capacity: usize,
}

/// Why a session stopped reading
#[derive(Debug)]
pub enum CloseReason {
    /// `close()` was called on this side
    Local,
    /// Peer closed the stream on a frame boundary
    PeerClosed,
    /// Transport failure or malformed input
    Error(FrameError),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "closed locally"),
            Self::PeerClosed => write!(f, "closed by peer"),
            Self::Error(e) => write!(f, "{e}"),
        }
    }
}

/// Receives everything a running session reads
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// A complete frame arrived. Must not block.
    fn on_frame(&self, session: &Arc<Session>, frame: Frame);

    /// The receive loop ended. Called exactly once per started session.
    async fn on_closed(&self, session: &Arc<Session>, reason: CloseReason);
}

struct Io {
    reader: Reader,
    writer: Writer,
    queue: mpsc::Receiver<Frame>,
}

/// A client or peer connection
///
/// Sends are queued and written by a single writer task, so frames from
/// concurrent callers never interleave and keep their enqueue order.
pub struct Session {
    id: Uuid,
    variant: ProtocolVariant,
    remote_addr: Option<SocketAddr>,
    user_id: AtomicU64,
    state: Arc<StateCell>,
    sender: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    last_active: Mutex<Instant>,
    io: Mutex<Option<Io>>,
    /// Set by the writer when a write fails, reported as the close reason
    write_error: Mutex<Option<FrameError>>,
}

impl Session {
    /// Wrap a stream. Nothing is read or written until [`Session::start`].
    pub fn new<S>(stream: S, options: SessionOptions, remote_addr: Option<SocketAddr>) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let state = Arc::new(StateCell::default());
        let stream: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(stream);

        let reader = FramedRead::new(
            read_half,
            FrameCodec::new(options.variant, options.max_body_length).observed(state.clone()),
        );
        let writer = FramedWrite::new(
            write_half,
            FrameCodec::new(options.variant, options.max_body_length),
        );
        let (sender, queue) = mpsc::channel(options.send_queue_capacity.max(1));

        Arc::new(Self {
            id: Uuid::new_v4(),
            variant: options.variant,
            remote_addr,
            user_id: AtomicU64::new(0),
            state,
            sender,
            cancel: CancellationToken::new(),
            last_active: Mutex::new(Instant::now()),
            io: Mutex::new(Some(Io {
                reader,
                writer,
                queue,
            })),
            write_error: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Logged-in user, `0` before login
    pub fn user_id(&self) -> UserId {
        self.user_id.load(Ordering::Acquire)
    }

    pub fn set_user_id(&self, uid: UserId) {
        self.user_id.store(uid, Ordering::Release);
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id() != 0
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.state.get() == ConnectionState::Closed
    }

    /// Record inbound activity
    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    /// Spawn the reader and writer tasks. Later calls do nothing.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn SessionHandler>) {
        let Some(io) = self.io.lock().take() else {
            tracing::warn!(session_id = %self.id, "Session already started");
            return;
        };
        self.state.set(ConnectionState::HeaderWait);

        tokio::spawn(write_loop(self.clone(), io.writer, io.queue));
        tokio::spawn(read_loop(self.clone(), io.reader, handler));

        tracing::debug!(
            session_id = %self.id,
            remote_addr = ?self.remote_addr,
            variant = ?self.variant,
            "Session started"
        );
    }

    /// Queue a frame. Returns `false` if the session is closed or the queue is full.
    pub fn send_frame(&self, frame: Frame) -> bool {
        if self.is_closed() {
            tracing::trace!(session_id = %self.id, msg_id = frame.msg_id, "Send on closed session");
            return false;
        }

        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                tracing::warn!(
                    session_id = %self.id,
                    msg_id = frame.msg_id,
                    "Send queue full, dropping frame"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn send(&self, msg_id: impl Into<u32>, body: impl Into<bytes::Bytes>) -> bool {
        self.send_frame(Frame::new(msg_id, body))
    }

    pub fn send_json(&self, msg_id: impl Into<u32>, body: &Value) -> bool {
        self.send_frame(Frame::from_value(msg_id, body))
    }

    /// Close the session. Frames already queued are flushed first.
    ///
    /// Idempotent. Does not touch any registry; the handler's `on_closed`
    /// is where owners clean up.
    pub fn close(&self) {
        if !self.state.close() {
            return;
        }
        self.cancel.cancel();
        tracing::debug!(session_id = %self.id, user_id = self.user_id(), "Session closing");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("user_id", &self.user_id())
            .field("state", &self.state())
            .finish()
    }
}

async fn read_loop(session: Arc<Session>, mut reader: Reader, handler: Arc<dyn SessionHandler>) {
    let reason = loop {
        tokio::select! {
            () = session.cancel.cancelled() => {
                break session
                    .write_error
                    .lock()
                    .take()
                    .map_or(CloseReason::Local, CloseReason::Error);
            }
            next = reader.next() => match next {
                Some(Ok(frame)) => {
                    session.touch();
                    tracing::trace!(session_id = %session.id, msg_id = frame.msg_id, "Frame received");
                    handler.on_frame(&session, frame);
                }
                Some(Err(e)) => break CloseReason::Error(e),
                None => break CloseReason::PeerClosed,
            },
        }
    };

    match &reason {
        CloseReason::Error(e) if e.is_protocol_violation() => {
            tracing::warn!(session_id = %session.id, error = %e, "Protocol violation, closing session");
        }
        reason => {
            tracing::debug!(session_id = %session.id, reason = %reason, "Receive loop ended");
        }
    }

    session.close();
    handler.on_closed(&session, reason).await;
}

async fn write_loop(session: Arc<Session>, mut writer: Writer, mut queue: mpsc::Receiver<Frame>) {
    loop {
        tokio::select! {
            biased;
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.send(frame).await {
                    tracing::debug!(session_id = %session.id, error = %e, "Write failed");
                    *session.write_error.lock() = Some(e);
                    break;
                }
            }
            () = session.cancel.cancelled() => {
                let flush = async {
                    while let Ok(frame) = queue.try_recv() {
                        writer.feed(frame).await?;
                    }
                    writer.flush().await
                };
                if let Ok(Err(e)) = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, flush).await {
                    tracing::debug!(session_id = %session.id, error = %e, "Flush on close failed");
                }
                break;
            }
        }
    }

    queue.close();
    if let Err(e) = writer.close().await {
        tracing::trace!(session_id = %session.id, error = %e, "Shutdown after close failed");
    }
    // A dead write side ends the read side too
    session.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc::UnboundedSender;

    struct Recorder {
        frames: UnboundedSender<Frame>,
        closed: UnboundedSender<String>,
    }

    #[async_trait]
    impl SessionHandler for Recorder {
        fn on_frame(&self, _session: &Arc<Session>, frame: Frame) {
            let _ = self.frames.send(frame);
        }

        async fn on_closed(&self, _session: &Arc<Session>, reason: CloseReason) {
            let tag = match reason {
                CloseReason::Local => "local".to_string(),
                CloseReason::PeerClosed => "peer".to_string(),
                CloseReason::Error(e) => format!("error: {e}"),
            };
            let _ = self.closed.send(tag);
        }
    }

    fn options(capacity: usize) -> SessionOptions {
        SessionOptions {
            variant: ProtocolVariant::Standard,
            max_body_length: 1024,
            send_queue_capacity: capacity,
        }
    }

    fn started(
        capacity: usize,
    ) -> (
        Arc<Session>,
        DuplexStream,
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let session = Session::new(server, options(capacity), None);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        session.start(Arc::new(Recorder {
            frames: frames_tx,
            closed: closed_tx,
        }));
        (session, client, frames_rx, closed_rx)
    }

    async fn read_frame(client: &mut DuplexStream) -> (u32, Vec<u8>) {
        let msg_id = client.read_u32().await.unwrap();
        let len = client.read_u32().await.unwrap() as usize;
        let mut body = vec![0; len];
        client.read_exact(&mut body).await.unwrap();
        (msg_id, body)
    }

    #[tokio::test]
    async fn test_frames_are_dispatched_to_handler() {
        let (session, mut client, mut frames, _closed) = started(16);
        assert_eq!(session.state(), ConnectionState::HeaderWait);

        client.write_u32(1005).await.unwrap();
        client.write_u32(2).await.unwrap();
        client.write_all(b"{}").await.unwrap();

        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.msg_id, 1005);
        assert_eq!(&frame.body[..], b"{}");
    }

    #[tokio::test]
    async fn test_send_preserves_order() {
        let (session, mut client, _frames, _closed) = started(16);

        for i in 0..5u32 {
            assert!(session.send(1000 + i, format!("{i}")));
        }
        for i in 0..5u32 {
            let (msg_id, body) = read_frame(&mut client).await;
            assert_eq!(msg_id, 1000 + i);
            assert_eq!(body, format!("{i}").into_bytes());
        }
    }

    /// Never readable; every write fails
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_the_close_reason() {
        let session = Session::new(BrokenPipe, options(16), None);
        let (frames_tx, _frames_rx) = mpsc::unbounded_channel();
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        session.start(Arc::new(Recorder {
            frames: frames_tx,
            closed: closed_tx,
        }));

        assert!(session.send(1003u32, "{}"));
        let reason = tokio::time::timeout(Duration::from_secs(1), closed_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, "error: Connection reset by peer");
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (server, _client) = tokio::io::duplex(1024);
        // Not started: nothing drains the queue
        let session = Session::new(server, options(2), None);

        assert!(session.send(1u32, "a"));
        assert!(session.send(2u32, "b"));
        assert!(!session.send(3u32, "c"));
    }

    #[tokio::test]
    async fn test_close_flushes_queued_frames() {
        let (session, mut client, _frames, mut closed) = started(16);

        assert!(session.send(1019u32, "bye"));
        session.close();
        session.close();

        let (msg_id, body) = read_frame(&mut client).await;
        assert_eq!(msg_id, 1019);
        assert_eq!(body, b"bye");

        assert_eq!(closed.recv().await.unwrap(), "local");
        assert!(session.is_closed());
        assert!(!session.send(1u32, "late"));

        // Stream is shut down after the flush
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_peer_eof_reports_closed_once() {
        let (session, client, _frames, mut closed) = started(16);
        drop(client);

        assert_eq!(closed.recv().await.unwrap(), "peer");
        assert!(session.is_closed());
        session.close();
        assert!(closed.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_header_closes_session() {
        let (session, mut client, mut frames, mut closed) = started(16);

        client.write_u32(1020).await.unwrap();
        client.write_u32(1_000_000).await.unwrap();

        let reason = closed.recv().await.unwrap();
        assert!(reason.starts_with("error"), "{reason}");
        assert!(session.is_closed());
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_twice_is_ignored() {
        let (session, mut client, mut frames, _closed) = started(16);
        let (frames_tx, _) = mpsc::unbounded_channel();
        let (closed_tx, _) = mpsc::unbounded_channel();
        session.start(Arc::new(Recorder {
            frames: frames_tx,
            closed: closed_tx,
        }));

        client.write_u32(1003).await.unwrap();
        client.write_u32(0).await.unwrap();
        assert_eq!(frames.recv().await.unwrap().msg_id, 1003);
    }

    #[tokio::test]
    async fn test_user_id_defaults_to_zero() {
        let (server, _client) = tokio::io::duplex(64);
        let session = Session::new(server, options(4), None);
        assert_eq!(session.user_id(), 0);
        assert!(!session.is_authenticated());
        session.set_user_id(42);
        assert!(session.is_authenticated());
        assert_eq!(session.state(), ConnectionState::Connecting);
    }
}

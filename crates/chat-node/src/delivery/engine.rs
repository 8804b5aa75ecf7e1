//! Reliable delivery over the fire-and-forget frame transport
//!
//! Every reliable frame gets a node-wide sequence number (`"seq"` in the
//! body) and a timer task. The receiver answers with an ACK carrying the
//! same `seq`. Unacknowledged frames are re-sent until `max_retries`
//! attempts have timed out, then reported on the failure channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use chat_common::DeliveryConfig;
use chat_core::{ChatMessage, UserId};

use crate::connection::Session;
use crate::protocol::Frame;

/// What a reliable frame carries, used to pick the fallback on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryKind {
    /// A chat message; stored offline if delivery fails
    Message(ChatMessage),
    /// A notification with no durable fallback
    Notify,
    /// Presence probe; failure means the client is gone
    Heartbeat,
}

/// A delivery that was abandoned after its last retry, or cancelled with its session
#[derive(Debug)]
pub struct FailedDelivery {
    pub seq: u64,
    pub session: Arc<Session>,
    pub target_uid: UserId,
    pub kind: DeliveryKind,
}

struct PendingDelivery {
    session: Arc<Session>,
    target_uid: UserId,
    frame: Frame,
    kind: DeliveryKind,
    retry_count: u32,
    cancelled: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl PendingDelivery {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.timer.abort();
    }

    fn into_failed(self, seq: u64) -> FailedDelivery {
        FailedDelivery {
            seq,
            session: self.session,
            target_uid: self.target_uid,
            kind: self.kind,
        }
    }
}

enum TimerAction {
    Resend(Arc<Session>, Frame),
    Abandon(FailedDelivery),
}

/// Pending deliveries and their retransmission timers
pub struct DeliveryEngine {
    pending: Mutex<HashMap<u64, PendingDelivery>>,
    next_seq: AtomicU64,
    ack_timeout: Duration,
    max_retries: u32,
    failed: mpsc::UnboundedSender<FailedDelivery>,
}

impl DeliveryEngine {
    /// Create an engine and the receiver for abandoned deliveries
    pub fn new(config: &DeliveryConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<FailedDelivery>) {
        let (failed, failed_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            ack_timeout: config.ack_timeout,
            max_retries: config.max_retries.max(1),
            failed,
        });
        (engine, failed_rx)
    }

    /// Send `body` to `session` and keep re-sending until it is acknowledged
    ///
    /// `"seq"` is added to the body. Returns the sequence number.
    pub fn send_reliable(
        self: &Arc<Self>,
        session: &Arc<Session>,
        target_uid: UserId,
        msg_id: impl Into<u32>,
        mut body: Map<String, Value>,
        kind: DeliveryKind,
    ) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        body.insert("seq".to_string(), Value::from(seq));
        let frame = Frame::new(msg_id, Bytes::from(Value::Object(body).to_string()));
        let cancelled = Arc::new(AtomicBool::new(false));

        {
            let mut pending = self.pending.lock();
            let timer = tokio::spawn(run_timer(
                Arc::downgrade(self),
                seq,
                self.ack_timeout,
                cancelled.clone(),
            ));
            pending.insert(
                seq,
                PendingDelivery {
                    session: session.clone(),
                    target_uid,
                    frame: frame.clone(),
                    kind,
                    retry_count: 0,
                    cancelled,
                    timer,
                },
            );
        }

        tracing::debug!(
            session_id = %session.id(),
            user_id = target_uid,
            msg_id = frame.msg_id,
            seq,
            "Reliable send"
        );
        session.send_frame(frame);
        seq
    }

    /// Acknowledge `seq` on behalf of `session_id`
    ///
    /// Returns `false` for unknown sequence numbers and for ACKs arriving
    /// on a session other than the one the frame was sent to.
    pub fn ack(&self, session_id: Uuid, seq: u64) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&seq) {
            Some(entry) if entry.session.id() == session_id => {}
            _ => return false,
        }
        if let Some(entry) = pending.remove(&seq) {
            entry.cancel();
            tracing::trace!(session_id = %session_id, seq, retries = entry.retry_count, "Delivery acknowledged");
        }
        true
    }

    /// Drop every pending delivery addressed to a session and return them
    pub fn cancel_for_session(&self, session_id: Uuid) -> Vec<FailedDelivery> {
        let mut pending = self.pending.lock();
        let seqs: Vec<u64> = pending
            .iter()
            .filter(|(_, entry)| entry.session.id() == session_id)
            .map(|(seq, _)| *seq)
            .collect();

        seqs.into_iter()
            .filter_map(|seq| {
                pending.remove(&seq).map(|entry| {
                    entry.cancel();
                    entry.into_failed(seq)
                })
            })
            .collect()
    }

    /// Whether a presence probe to this session is still unanswered
    pub fn has_pending_heartbeat(&self, session_id: Uuid) -> bool {
        self.pending.lock().values().any(|entry| {
            entry.kind == DeliveryKind::Heartbeat && entry.session.id() == session_id
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel everything without reporting failures
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        for (_, entry) in &drained {
            entry.cancel();
        }
        tracing::debug!(cancelled = drained.len(), "Delivery engine stopped");
    }

    fn on_timeout(&self, seq: u64, cancelled: &AtomicBool) -> Option<TimerAction> {
        let mut pending = self.pending.lock();
        // ACK may have won the race after the timer woke
        if cancelled.load(Ordering::Acquire) {
            return None;
        }
        let entry = pending.get_mut(&seq)?;
        entry.retry_count += 1;

        if entry.retry_count < self.max_retries {
            return Some(TimerAction::Resend(entry.session.clone(), entry.frame.clone()));
        }

        let entry = pending.remove(&seq)?;
        entry.cancelled.store(true, Ordering::Release);
        Some(TimerAction::Abandon(entry.into_failed(seq)))
    }
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("pending", &self.pending_count())
            .field("ack_timeout", &self.ack_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

async fn run_timer(
    engine: Weak<DeliveryEngine>,
    seq: u64,
    timeout: Duration,
    cancelled: Arc<AtomicBool>,
) {
    loop {
        tokio::time::sleep(timeout).await;

        let Some(engine) = engine.upgrade() else {
            return;
        };
        match engine.on_timeout(seq, &cancelled) {
            None => return,
            Some(TimerAction::Resend(session, frame)) => {
                tracing::debug!(session_id = %session.id(), seq, "Ack timeout, resending");
                session.send_frame(frame);
            }
            Some(TimerAction::Abandon(failed)) => {
                tracing::warn!(
                    session_id = %failed.session.id(),
                    user_id = failed.target_uid,
                    seq,
                    "Delivery abandoned after retries"
                );
                // Receiver gone only during shutdown
                let _ = engine.failed.send(failed);
                return;
            }
        }
    }
}

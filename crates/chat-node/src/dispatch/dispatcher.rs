//! Dispatcher - one ordered queue and a single worker per instance
//!
//! Frames are pushed from session read loops and processed strictly in
//! arrival order, so handlers never run concurrently with each other.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::Session;
use crate::handlers::HandlerError;
use crate::protocol::{ErrorCode, Frame};

use super::registry::{HandlerRegistry, Origin, Reply};

struct Job {
    session: Arc<Session>,
    frame: Frame,
}

/// Single-consumer handler queue
pub struct Dispatcher {
    name: &'static str,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the worker
    pub fn start<S>(name: &'static str, state: S, registry: HandlerRegistry<S>) -> Self
    where
        S: Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(name, state, registry, receiver));

        tracing::debug!(dispatcher = name, "Dispatcher started");

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a frame. Returns `false` once the dispatcher is stopped.
    pub fn push(&self, session: Arc<Session>, frame: Frame) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            tracing::debug!(
                dispatcher = self.name,
                msg_id = frame.msg_id,
                "Dispatcher stopped, dropping frame"
            );
            return false;
        };
        sender.send(Job { session, frame }).is_ok()
    }

    /// Stop accepting frames, process what is queued, then join the worker
    pub async fn stop(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(dispatcher = self.name, error = %e, "Dispatcher worker failed");
            }
            tracing::debug!(dispatcher = self.name, "Dispatcher stopped");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("stopped", &self.sender.lock().is_none())
            .finish()
    }
}

async fn run_worker<S>(
    name: &'static str,
    state: S,
    registry: HandlerRegistry<S>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
) where
    S: Send + Sync + 'static,
{
    // Ends once every sender is gone and the queue is drained
    while let Some(job) = receiver.recv().await {
        process(&state, &registry, job).await;
    }
    tracing::trace!(dispatcher = name, "Dispatcher worker exiting");
}

async fn process<S>(state: &S, registry: &HandlerRegistry<S>, job: Job)
where
    S: Send + Sync + 'static,
{
    let Job { session, frame } = job;
    let origin = Origin::of(&session);

    let Some(registration) = registry.lookup(frame.msg_id, origin) else {
        tracing::warn!(
            session_id = %session.id(),
            msg_id = frame.msg_id,
            origin = ?origin,
            "No handler for message"
        );
        respond(&session, &frame, frame.msg_id, error_body(ErrorCode::NotFound));
        return;
    };
    let response_id = registration.response_id.unwrap_or(frame.msg_id);

    let body = match frame.body_json() {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(session_id = %session.id(), msg_id = frame.msg_id, error = %e, "Malformed body");
            respond(&session, &frame, response_id, HandlerError::from(e).to_envelope());
            return;
        }
    };

    let local = match origin {
        Origin::Client => Some(&session),
        Origin::Peer => None,
    };

    match registration.handler.handle(state, local, frame.msg_id, body).await {
        Ok(Reply::Body(mut body)) => {
            if registration.response_id.is_some() {
                if let Some(map) = body.as_object_mut() {
                    map.entry("error").or_insert(Value::from(ErrorCode::Success.as_i32()));
                }
                respond(&session, &frame, response_id, body);
            }
        }
        Ok(Reply::Handled) => {}
        Err(e) => {
            tracing::debug!(
                session_id = %session.id(),
                msg_id = frame.msg_id,
                error = %e,
                "Handler failed"
            );
            respond(&session, &frame, response_id, e.to_envelope());
        }
    }
}

fn error_body(code: ErrorCode) -> Value {
    serde_json::json!({ "error": code, "message": code.description() })
}

/// Answer on the originating session, echoing the peer route if any
fn respond(session: &Session, request: &Frame, msg_id: u32, body: Value) {
    let frame = Frame::from_value(msg_id, &body).with_route(request.route);
    session.send_frame(frame);
}

//! Handler registry: message id to handler, filled once at startup

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::connection::Session;
use crate::handlers::HandlerResult;
use crate::protocol::ProtocolVariant;

/// Where a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    /// Another node, over the peer protocol
    Peer,
}

impl Origin {
    pub fn of(session: &Session) -> Self {
        match session.variant() {
            ProtocolVariant::Peer => Self::Peer,
            ProtocolVariant::Standard | ProtocolVariant::Compact => Self::Client,
        }
    }
}

/// Origins a registration accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Client,
    Peer,
    Both,
}

impl Accepts {
    pub fn allows(self, origin: Origin) -> bool {
        matches!(
            (self, origin),
            (Self::Both, _) | (Self::Client, Origin::Client) | (Self::Peer, Origin::Peer)
        )
    }
}

/// What a handler wants sent back
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Send this body with the registered response id
    Body(Value),
    /// The handler already answered (or nothing is to be sent)
    Handled,
}

/// A message handler
///
/// `session` is `None` when the frame was forwarded by a peer node; there
/// is no local client to answer or inspect in that case.
#[async_trait]
pub trait MessageHandler<S>: Send + Sync {
    async fn handle(
        &self,
        state: &S,
        session: Option<&Arc<Session>>,
        msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply>;
}

pub(crate) struct Registration<S> {
    pub(crate) handler: Arc<dyn MessageHandler<S>>,
    pub(crate) response_id: Option<u32>,
    pub(crate) accepts: Accepts,
}

/// Handlers by message id
pub struct HandlerRegistry<S> {
    handlers: HashMap<u32, Registration<S>>,
}

impl<S> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. A second registration for the same id is logged and ignored.
    pub fn register<H>(
        &mut self,
        msg_id: impl Into<u32>,
        response_id: Option<u32>,
        accepts: Accepts,
        handler: H,
    ) -> bool
    where
        H: MessageHandler<S> + 'static,
    {
        let msg_id = msg_id.into();
        if self.handlers.contains_key(&msg_id) {
            tracing::error!(msg_id, "Handler already registered, ignoring");
            return false;
        }
        self.handlers.insert(
            msg_id,
            Registration {
                handler: Arc::new(handler),
                response_id,
                accepts,
            },
        );
        true
    }

    /// Handler for `msg_id`, if one exists and accepts `origin`
    pub(crate) fn lookup(&self, msg_id: u32, origin: Origin) -> Option<&Registration<S>> {
        self.handlers
            .get(&msg_id)
            .filter(|registration| registration.accepts.allows(origin))
    }

    pub fn contains(&self, msg_id: u32) -> bool {
        self.handlers.contains_key(&msg_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

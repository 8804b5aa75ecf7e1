//! # chat-node
//!
//! IM node: framed TCP sessions for clients and peer nodes, the local
//! presence registry, at-least-once delivery with ACKs and retransmission,
//! and the handlers for chat, friend and group requests.
//!
//! ## Layout
//!
//! - [`protocol`]: message ids, error codes, frames and the frame codec
//! - [`connection`]: sessions and the session manager
//! - [`presence`]: user id to session
//! - [`delivery`]: reliable delivery engine
//! - [`dispatch`]: handler registry and ordered dispatch queue
//! - [`handlers`]: request handlers and message routing
//! - [`peer`]: RPCs to other nodes over pooled connections
//! - [`server`]: listeners, background tasks and the HTTP endpoints

pub mod connection;
pub mod delivery;
pub mod dispatch;
pub mod handlers;
pub mod peer;
pub mod presence;
pub mod protocol;
pub mod server;

pub use connection::{Session, SessionManager};
pub use delivery::DeliveryEngine;
pub use presence::PresenceRegistry;
pub use protocol::{ErrorCode, Frame, FrameCodec, MsgId, ProtocolVariant};
pub use server::{run, Node, NodeState, Stores};

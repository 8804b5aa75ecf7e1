//! Connections: sessions and the per-node session manager

mod manager;
mod session;

pub use manager::SessionManager;
pub use session::{ByteStream, CloseReason, Session, SessionHandler, SessionOptions};

//! In-process store implementations
//!
//! Used when no database or Redis URL is configured, and by tests that need
//! isolated instances. Every store is an ordinary value; nothing here is global.

mod message_store;
mod presence_store;
mod user_store;

pub use message_store::MemoryMessageStore;
pub use presence_store::MemoryPresenceStore;
pub use user_store::MemoryUserStore;

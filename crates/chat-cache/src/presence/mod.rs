//! Cluster presence and message de-duplication keys

mod user_presence;

pub use user_presence::RedisPresenceStore;

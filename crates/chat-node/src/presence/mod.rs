//! Local presence: user id to session

mod registry;

pub use registry::PresenceRegistry;

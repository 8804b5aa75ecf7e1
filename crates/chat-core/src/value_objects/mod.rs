//! Value objects - identifiers shared across the node

mod id_generator;

pub use id_generator::IdGenerator;

/// User identifier. `0` means "not authenticated yet".
pub type UserId = u64;

/// Group identifier, produced by [`IdGenerator`].
pub type GroupId = u64;

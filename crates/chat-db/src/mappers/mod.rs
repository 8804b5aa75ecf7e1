//! Entity <-> model mappers
//!
//! Ids are unsigned in the domain and stored as BIGINT; the casts below are
//! bit-preserving in both directions.

mod friend;
mod group;
mod message;
mod user;

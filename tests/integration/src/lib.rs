//! Integration test utilities for the chat node
//!
//! Boots whole nodes on loopback and talks to them over the binary
//! protocol and the HTTP endpoints.

pub mod client;
pub mod helpers;

pub use client::*;
pub use helpers::*;

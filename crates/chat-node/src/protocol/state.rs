//! Connection read state shared between a codec and its session

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a connection's read side currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Accepted, receive loop not started
    Connecting = 0,
    /// Waiting for a complete header
    HeaderWait = 1,
    /// Header decoded, waiting for the body
    BodyWait = 2,
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::HeaderWait,
            2 => Self::BodyWait,
            _ => Self::Closed,
        }
    }
}

/// Atomic holder for a [`ConnectionState`]. `Closed` is terminal.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `state` unless already closed. Returns whether it changed.
    pub fn set(&self, state: ConnectionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::Closed as u8).then_some(state as u8)
            })
            .is_ok()
    }

    /// Mark closed. Returns `false` if it already was.
    pub fn close(&self) -> bool {
        self.0.swap(ConnectionState::Closed as u8, Ordering::AcqRel) != ConnectionState::Closed as u8
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::Connecting)
    }
}

//! Time-ordered 64-bit id generator
//!
//! Layout (snowflake style):
//! - Bits 63-22: milliseconds since [`IdGenerator::EPOCH`]
//! - Bits 21-12: worker id (0-1023)
//! - Bits 11-0:  per-millisecond sequence (0-4095)
//!
//! Used for group ids and server-side message ids. Ids produced by one
//! generator are strictly increasing.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Thread-safe id generator
#[derive(Debug)]
pub struct IdGenerator {
    worker_id: u16,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Custom epoch: 2024-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: u64 = 1_704_067_200_000;

    /// Create a generator for the given worker id.
    ///
    /// Worker ids above 1023 are masked to 10 bits.
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: worker_id & MAX_WORKER_ID,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Derive a worker id from a node name so peers sharing a store do not collide.
    pub fn for_node(node_name: &str) -> Self {
        let hash = node_name
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        Self::new((hash % u32::from(MAX_WORKER_ID + 1)) as u16)
    }

    /// Generate the next id
    pub fn generate(&self) -> u64 {
        let mut state = self.state.lock();
        let mut timestamp = Self::current_millis().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond; borrow the next one.
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        ((timestamp - Self::EPOCH) << (WORKER_BITS + SEQUENCE_BITS))
            | (u64::from(self.worker_id) << SEQUENCE_BITS)
            | state.sequence
    }

    /// Worker id embedded in generated ids
    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Extract the worker id from a generated id
    pub fn worker_of(id: u64) -> u16 {
        ((id >> SEQUENCE_BITS) & u64::from(MAX_WORKER_ID)) as u16
    }

    fn current_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(Self::EPOCH)
            .max(Self::EPOCH)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

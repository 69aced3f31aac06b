//! Stream position and in-memory backfill cursor.
//!
//! `StreamPosition` is the causal position of a log: (block_number, log_index),
//! totally ordered. The aggregator rejects any event that does not advance it.
//! `Cursor` tracks the last backfilled block; no disk persistence, so process
//! restarts re-read from start_block (duplicates are rejected downstream by the
//! aggregator's ordering guard).

use std::fmt;

/// Causal position of a log within the chain: block number, then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl StreamPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Cursor: last processed block. In-memory only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pub last_processed_block: u64,
}

impl Cursor {
    pub fn new(last_processed_block: u64) -> Self {
        Self {
            last_processed_block,
        }
    }
}

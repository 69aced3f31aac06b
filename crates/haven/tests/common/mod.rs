//! Synthetic ordered event streams for aggregation tests.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use alloy::primitives::U256;
use haven::{EventPayload, ObservedEvent};

pub fn addr(n: u8) -> [u8; 20] {
    [n; 20]
}

pub fn u(n: u64) -> U256 {
    U256::from(n)
}

/// Produces events with strictly increasing (block_number, log_index): one
/// block per event unless `at_same_block` is used.
pub struct Stream {
    next_block: u64,
    next_log_index: u64,
}

impl Stream {
    pub fn new() -> Self {
        Self {
            next_block: 1,
            next_log_index: 0,
        }
    }

    /// Next event in a fresh block.
    pub fn at(&mut self, timestamp: u64, payload: EventPayload) -> ObservedEvent {
        self.next_log_index = 0;
        let ev = self.build(timestamp, payload);
        self.next_block += 1;
        ev
    }

    /// Next event in the same block as the previous one (log_index advances).
    pub fn at_same_block(&mut self, timestamp: u64, payload: EventPayload) -> ObservedEvent {
        self.next_block -= 1;
        let ev = self.build(timestamp, payload);
        self.next_block += 1;
        ev
    }

    fn build(&mut self, timestamp: u64, payload: EventPayload) -> ObservedEvent {
        let mut tx_hash = [0u8; 32];
        tx_hash[24..].copy_from_slice(&self.next_block.to_be_bytes());
        let ev = ObservedEvent {
            block_number: self.next_block,
            tx_hash,
            log_index: self.next_log_index,
            timestamp,
            payload,
        };
        self.next_log_index += 1;
        ev
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

pub fn staked(user: [u8; 20], amount: u64, new_total: u64, rate: u64) -> EventPayload {
    EventPayload::Staked {
        user,
        amount: u(amount),
        new_total_staked: u(new_total),
        current_reward_rate: u(rate),
    }
}

pub fn withdrawn(
    user: [u8; 20],
    amount: u64,
    new_total: u64,
    rate: u64,
    rewards_accrued: u64,
) -> EventPayload {
    EventPayload::Withdrawn {
        user,
        amount: u(amount),
        new_total_staked: u(new_total),
        current_reward_rate: u(rate),
        rewards_accrued: u(rewards_accrued),
    }
}

pub fn claimed(user: [u8; 20], amount: u64, new_pending: u64, total_staked: u64) -> EventPayload {
    EventPayload::RewardsClaimed {
        user,
        amount: u(amount),
        new_pending_rewards: u(new_pending),
        total_staked: u(total_staked),
    }
}

pub fn emergency(user: [u8; 20], amount: u64, penalty: u64, new_total: u64) -> EventPayload {
    EventPayload::EmergencyWithdrawn {
        user,
        amount: u(amount),
        penalty: u(penalty),
        new_total_staked: u(new_total),
    }
}

pub fn rate_updated(old_rate: u64, new_rate: u64, total_staked: u64) -> EventPayload {
    EventPayload::RewardRateUpdated {
        old_rate: u(old_rate),
        new_rate: u(new_rate),
        total_staked: u(total_staked),
    }
}

pub fn initialized(rate: u64) -> EventPayload {
    EventPayload::Initialized {
        initial_reward_rate: u(rate),
    }
}

//! Event aggregator: deterministic fold of the observed event stream into the
//! read-model ledger.
//!
//! One handler per event kind; each is a function of (current ledger, incoming
//! event). Events must arrive in strictly increasing (block_number, log_index)
//! order (the upstream delivery contract); any regression is fatal
//! ([AggregatorError::OutOfOrder]), surfaced to the hosting task rather than
//! retried. Running totals mirror the `newTotalStaked` the contract emits; the
//! aggregator records them and never recomputes its own arithmetic over them.

use crate::abi::{EventPayload, ObservedEvent};
use crate::cursor::StreamPosition;
use crate::model::{
    day_bucket, record_id, tx_hash_hex, EmergencyWithdrawal, RewardClaim, RewardRateUpdate,
    StakingPosition, Withdrawal,
};
use crate::store::Ledger;
use alloy::primitives::U256;
use thiserror::Error;

/// Fatal contract violations in the inbound stream. There is no recoverable
/// error path inside the fold itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("event out of causal order: got {got}, last applied {last}")]
    OutOfOrder {
        got: StreamPosition,
        last: StreamPosition,
    },
}

/// Sequential single-writer fold over the staking-event stream.
#[derive(Debug, Default)]
pub struct Aggregator {
    ledger: Ledger,
    last_applied: Option<StreamPosition>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the projected ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Position of the most recently applied event.
    pub fn last_applied(&self) -> Option<StreamPosition> {
        self.last_applied
    }

    /// Apply one event. Rejects anything that does not advance the causal
    /// position (duplicates included); otherwise dispatches to the handler for
    /// the event kind.
    pub fn apply(&mut self, ev: &ObservedEvent) -> Result<(), AggregatorError> {
        let position = StreamPosition::new(ev.block_number, ev.log_index);
        if let Some(last) = self.last_applied {
            if position <= last {
                return Err(AggregatorError::OutOfOrder {
                    got: position,
                    last,
                });
            }
        }
        match ev.payload {
            EventPayload::Staked {
                user,
                amount,
                new_total_staked,
                current_reward_rate,
            } => self.on_staked(ev, user, amount, new_total_staked, current_reward_rate),
            EventPayload::Withdrawn {
                user,
                amount,
                new_total_staked,
                current_reward_rate,
                rewards_accrued,
            } => self.on_withdrawn(
                ev,
                user,
                amount,
                new_total_staked,
                current_reward_rate,
                rewards_accrued,
            ),
            EventPayload::RewardsClaimed {
                user,
                amount,
                new_pending_rewards,
                total_staked,
            } => self.on_rewards_claimed(ev, user, amount, new_pending_rewards, total_staked),
            EventPayload::EmergencyWithdrawn {
                user,
                amount,
                penalty,
                new_total_staked,
            } => self.on_emergency_withdrawn(ev, user, amount, penalty, new_total_staked),
            EventPayload::RewardRateUpdated {
                old_rate,
                new_rate,
                total_staked,
            } => self.on_reward_rate_updated(ev, old_rate, new_rate, total_staked),
            EventPayload::Initialized {
                initial_reward_rate,
            } => self.on_initialized(ev, initial_reward_rate),
        }
        self.last_applied = Some(position);
        Ok(())
    }

    fn on_staked(
        &mut self,
        ev: &ObservedEvent,
        user: [u8; 20],
        amount: U256,
        new_total_staked: U256,
        current_reward_rate: U256,
    ) {
        let ts = ev.timestamp;
        let u = self.ledger.user_mut(&user);
        // First-ever stake decides totalUsers and firstStakeTime; check before
        // mutating.
        let is_new_user = u.first_stake_time.is_none();
        u.total_staked = u.total_staked.saturating_add(amount);
        u.last_activity_time = ts;
        u.is_active = true;
        if is_new_user {
            u.first_stake_time = Some(ts);
        }
        let user_id = u.id.clone();
        let user_total = u.total_staked;

        self.ledger.push_position(StakingPosition {
            id: record_id(&ev.tx_hash, ev.log_index),
            user: user_id.clone(),
            amount,
            timestamp: ts,
            block_number: ev.block_number,
            transaction_hash: tx_hash_hex(&ev.tx_hash),
            new_total_staked,
            current_reward_rate,
            is_active: true,
        });

        let stats = self.ledger.stats_mut();
        stats.total_staked = new_total_staked;
        stats.current_reward_rate = current_reward_rate;
        stats.last_updated = ts;
        stats.total_staking_positions += 1;
        if is_new_user {
            stats.total_users += 1;
        }
        let total_users = stats.total_users;

        let day = day_bucket(ts);
        let snapshot = self.ledger.daily_mut(day);
        snapshot.total_staked = new_total_staked;
        snapshot.total_users = total_users;
        snapshot.daily_staked = snapshot.daily_staked.saturating_add(amount);
        snapshot.current_reward_rate = current_reward_rate;
        if is_new_user {
            snapshot.new_users_count += 1;
        }

        let user_snapshot = self.ledger.user_daily_mut(&user_id, day);
        user_snapshot.total_staked = user_total;
        user_snapshot.daily_staked = user_snapshot.daily_staked.saturating_add(amount);
    }

    fn on_withdrawn(
        &mut self,
        ev: &ObservedEvent,
        user: [u8; 20],
        amount: U256,
        new_total_staked: U256,
        current_reward_rate: U256,
        rewards_accrued: U256,
    ) {
        let ts = ev.timestamp;
        let u = self.ledger.user_mut(&user);
        u.total_staked = u.total_staked.saturating_sub(amount);
        u.last_activity_time = ts;
        u.is_active = u.total_staked > U256::ZERO;
        let user_id = u.id.clone();
        let user_total = u.total_staked;

        self.ledger.push_withdrawal(Withdrawal {
            id: record_id(&ev.tx_hash, ev.log_index),
            user: user_id.clone(),
            amount,
            timestamp: ts,
            block_number: ev.block_number,
            transaction_hash: tx_hash_hex(&ev.tx_hash),
            new_total_staked,
            current_reward_rate,
            rewards_accrued,
        });

        let stats = self.ledger.stats_mut();
        stats.total_staked = new_total_staked;
        stats.current_reward_rate = current_reward_rate;
        stats.last_updated = ts;
        stats.total_withdrawals += 1;

        let day = day_bucket(ts);
        let snapshot = self.ledger.daily_mut(day);
        snapshot.total_staked = new_total_staked;
        snapshot.daily_withdrawn = snapshot.daily_withdrawn.saturating_add(amount);
        snapshot.current_reward_rate = current_reward_rate;

        let user_snapshot = self.ledger.user_daily_mut(&user_id, day);
        user_snapshot.total_staked = user_total;
        user_snapshot.daily_withdrawn = user_snapshot.daily_withdrawn.saturating_add(amount);
    }

    fn on_rewards_claimed(
        &mut self,
        ev: &ObservedEvent,
        user: [u8; 20],
        amount: U256,
        new_pending_rewards: U256,
        total_staked: U256,
    ) {
        let ts = ev.timestamp;
        let u = self.ledger.user_mut(&user);
        u.total_claimed = u.total_claimed.saturating_add(amount);
        u.last_activity_time = ts;
        let user_id = u.id.clone();

        self.ledger.push_claim(RewardClaim {
            id: record_id(&ev.tx_hash, ev.log_index),
            user: user_id.clone(),
            amount,
            timestamp: ts,
            block_number: ev.block_number,
            transaction_hash: tx_hash_hex(&ev.tx_hash),
            new_pending_rewards,
            total_staked,
        });

        // Claiming pays out rewards only; staked principal is untouched, so
        // neither the protocol total nor the day bucket's total_staked moves.
        let stats = self.ledger.stats_mut();
        stats.total_rewards_claimed = stats.total_rewards_claimed.saturating_add(amount);
        stats.last_updated = ts;

        let day = day_bucket(ts);
        let snapshot = self.ledger.daily_mut(day);
        snapshot.daily_rewards_claimed = snapshot.daily_rewards_claimed.saturating_add(amount);

        let user_snapshot = self.ledger.user_daily_mut(&user_id, day);
        user_snapshot.daily_rewards_claimed =
            user_snapshot.daily_rewards_claimed.saturating_add(amount);
    }

    fn on_emergency_withdrawn(
        &mut self,
        ev: &ObservedEvent,
        user: [u8; 20],
        amount: U256,
        penalty: U256,
        new_total_staked: U256,
    ) {
        let ts = ev.timestamp;
        let u = self.ledger.user_mut(&user);
        // Emergency exit always empties the position, whatever the prior
        // balance was.
        u.total_staked = U256::ZERO;
        u.total_emergency_withdrawn = u.total_emergency_withdrawn.saturating_add(amount);
        u.last_activity_time = ts;
        u.is_active = false;
        let user_id = u.id.clone();

        self.ledger.push_emergency_withdrawal(EmergencyWithdrawal {
            id: record_id(&ev.tx_hash, ev.log_index),
            user: user_id,
            amount,
            penalty,
            timestamp: ts,
            block_number: ev.block_number,
            transaction_hash: tx_hash_hex(&ev.tx_hash),
            new_total_staked,
        });

        let stats = self.ledger.stats_mut();
        stats.total_staked = new_total_staked;
        stats.total_emergency_withdrawals += 1;
        stats.last_updated = ts;

        // The user-day bucket is intentionally not touched on this path; the
        // emergency flow only lands in the protocol-level rollup.
        let day = day_bucket(ts);
        let snapshot = self.ledger.daily_mut(day);
        snapshot.total_staked = new_total_staked;
        snapshot.daily_emergency_withdrawals = snapshot
            .daily_emergency_withdrawals
            .saturating_add(amount);
    }

    fn on_reward_rate_updated(
        &mut self,
        ev: &ObservedEvent,
        old_rate: U256,
        new_rate: U256,
        total_staked: U256,
    ) {
        let ts = ev.timestamp;
        self.ledger.push_rate_update(RewardRateUpdate {
            id: record_id(&ev.tx_hash, ev.log_index),
            old_rate,
            new_rate,
            timestamp: ts,
            block_number: ev.block_number,
            transaction_hash: tx_hash_hex(&ev.tx_hash),
            total_staked,
        });

        let stats = self.ledger.stats_mut();
        stats.current_reward_rate = new_rate;
        stats.last_updated = ts;
    }

    fn on_initialized(&mut self, ev: &ObservedEvent, initial_reward_rate: U256) {
        let stats = self.ledger.stats_mut();
        stats.current_reward_rate = initial_reward_rate;
        stats.last_updated = ev.timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staked_event(block: u64, log_index: u64, timestamp: u64) -> ObservedEvent {
        ObservedEvent {
            block_number: block,
            tx_hash: [block as u8; 32],
            log_index,
            timestamp,
            payload: EventPayload::Staked {
                user: [0xaa; 20],
                amount: U256::from(10),
                new_total_staked: U256::from(10),
                current_reward_rate: U256::from(1),
            },
        }
    }

    #[test]
    fn rejects_causal_regression() {
        let mut agg = Aggregator::new();
        agg.apply(&staked_event(5, 1, 100)).unwrap();
        let err = agg.apply(&staked_event(5, 1, 100)).unwrap_err();
        assert_eq!(
            err,
            AggregatorError::OutOfOrder {
                got: StreamPosition::new(5, 1),
                last: StreamPosition::new(5, 1),
            }
        );
        let err = agg.apply(&staked_event(4, 9, 90)).unwrap_err();
        assert!(matches!(err, AggregatorError::OutOfOrder { .. }));
        // Same block, later log index advances.
        agg.apply(&staked_event(5, 2, 100)).unwrap();
        assert_eq!(agg.last_applied(), Some(StreamPosition::new(5, 2)));
    }

    #[test]
    fn initialized_seeds_reward_rate() {
        let mut agg = Aggregator::new();
        agg.apply(&ObservedEvent {
            block_number: 1,
            tx_hash: [1; 32],
            log_index: 0,
            timestamp: 50,
            payload: EventPayload::Initialized {
                initial_reward_rate: U256::from(12),
            },
        })
        .unwrap();
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.current_reward_rate, U256::from(12));
        assert_eq!(stats.last_updated, 50);
        assert_eq!(stats.total_users, 0);
    }

    #[test]
    fn rate_update_does_not_create_day_bucket() {
        let mut agg = Aggregator::new();
        agg.apply(&ObservedEvent {
            block_number: 1,
            tx_hash: [1; 32],
            log_index: 0,
            timestamp: 100,
            payload: EventPayload::RewardRateUpdated {
                old_rate: U256::from(1),
                new_rate: U256::from(2),
                total_staked: U256::from(500),
            },
        })
        .unwrap();
        assert!(agg.ledger().daily_snapshot(0).is_none());
        assert_eq!(agg.ledger().recent_rate_updates(10).len(), 1);
    }
}

//! In-memory entity store for the staking read-models.
//!
//! Single-writer: the aggregator owns the ledger and applies events one at a
//! time, so there is no interior locking here. Mutating accessors are
//! get-or-create (entities are created on first reference, never destroyed);
//! the activity record types are pure appends. Read queries scan and sort,
//! mirroring the dashboard's query surface.

use crate::model::{
    DailyProtocolSnapshot, EmergencyWithdrawal, ProtocolStats, RewardClaim, RewardRateUpdate,
    StakingPosition, User, UserDailySnapshot, Withdrawal,
};
use crate::model::{user_day_id, user_id};
use std::collections::HashMap;

/// The entity store: a permanent historical ledger of everything the
/// aggregator has projected.
#[derive(Debug, Default)]
pub struct Ledger {
    users: HashMap<String, User>,
    stats: Option<ProtocolStats>,
    positions: Vec<StakingPosition>,
    withdrawals: Vec<Withdrawal>,
    claims: Vec<RewardClaim>,
    emergency_withdrawals: Vec<EmergencyWithdrawal>,
    rate_updates: Vec<RewardRateUpdate>,
    daily: HashMap<u64, DailyProtocolSnapshot>,
    user_daily: HashMap<String, UserDailySnapshot>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // Write side (aggregator only).

    pub(crate) fn user_mut(&mut self, address: &[u8; 20]) -> &mut User {
        let id = user_id(address);
        self.users
            .entry(id.clone())
            .or_insert_with(|| User::new(id))
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ProtocolStats {
        self.stats.get_or_insert_with(ProtocolStats::new)
    }

    pub(crate) fn daily_mut(&mut self, day: u64) -> &mut DailyProtocolSnapshot {
        self.daily
            .entry(day)
            .or_insert_with(|| DailyProtocolSnapshot::new(day))
    }

    pub(crate) fn user_daily_mut(&mut self, user: &str, day: u64) -> &mut UserDailySnapshot {
        self.user_daily
            .entry(user_day_id(user, day))
            .or_insert_with(|| UserDailySnapshot::new(user.to_string(), day))
    }

    pub(crate) fn push_position(&mut self, position: StakingPosition) {
        self.positions.push(position);
    }

    pub(crate) fn push_withdrawal(&mut self, withdrawal: Withdrawal) {
        self.withdrawals.push(withdrawal);
    }

    pub(crate) fn push_claim(&mut self, claim: RewardClaim) {
        self.claims.push(claim);
    }

    pub(crate) fn push_emergency_withdrawal(&mut self, record: EmergencyWithdrawal) {
        self.emergency_withdrawals.push(record);
    }

    pub(crate) fn push_rate_update(&mut self, update: RewardRateUpdate) {
        self.rate_updates.push(update);
    }

    // Read side. Point lookups return None until the entity has been created
    // by an event; range queries order newest-first.

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn protocol_stats(&self) -> Option<&ProtocolStats> {
        self.stats.as_ref()
    }

    pub fn daily_snapshot(&self, day: u64) -> Option<&DailyProtocolSnapshot> {
        self.daily.get(&day)
    }

    pub fn user_daily_snapshot(&self, user: &str, day: u64) -> Option<&UserDailySnapshot> {
        self.user_daily.get(&user_day_id(user, day))
    }

    /// A user's staking positions, newest first.
    pub fn positions_for_user(&self, user: &str) -> Vec<&StakingPosition> {
        let mut out: Vec<&StakingPosition> =
            self.positions.iter().filter(|p| p.user == user).collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// A user's withdrawals, newest first.
    pub fn withdrawals_for_user(&self, user: &str) -> Vec<&Withdrawal> {
        let mut out: Vec<&Withdrawal> =
            self.withdrawals.iter().filter(|w| w.user == user).collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// A user's reward claims, newest first.
    pub fn claims_for_user(&self, user: &str) -> Vec<&RewardClaim> {
        let mut out: Vec<&RewardClaim> = self.claims.iter().filter(|c| c.user == user).collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// A user's emergency withdrawals, newest first.
    pub fn emergency_withdrawals_for_user(&self, user: &str) -> Vec<&EmergencyWithdrawal> {
        let mut out: Vec<&EmergencyWithdrawal> = self
            .emergency_withdrawals
            .iter()
            .filter(|e| e.user == user)
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// Top n active users by total staked, descending.
    pub fn top_stakers(&self, n: usize) -> Vec<&User> {
        let mut out: Vec<&User> = self.users.values().filter(|u| u.is_active).collect();
        out.sort_by(|a, b| b.total_staked.cmp(&a.total_staked));
        out.truncate(n);
        out
    }

    /// The n most recent reward-rate changes, newest first.
    pub fn recent_rate_updates(&self, n: usize) -> Vec<&RewardRateUpdate> {
        let mut out: Vec<&RewardRateUpdate> = self.rate_updates.iter().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(n);
        out
    }

    /// The n most recent daily protocol snapshots, newest first.
    pub fn recent_daily_snapshots(&self, n: usize) -> Vec<&DailyProtocolSnapshot> {
        let mut out: Vec<&DailyProtocolSnapshot> = self.daily.values().collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        out.truncate(n);
        out
    }

    /// The n most recent daily snapshots for one user, newest first.
    pub fn recent_user_daily_snapshots(&self, user: &str, n: usize) -> Vec<&UserDailySnapshot> {
        let mut out: Vec<&UserDailySnapshot> = self
            .user_daily
            .values()
            .filter(|s| s.user == user)
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        out.truncate(n);
        out
    }
}

//! Read-model entities for the staking ledger.
//!
//! Every entity is keyed by a stable string id: users by lowercase hex address,
//! per-event records by `{tx_hash}-{log_index}`, day buckets by the bucket-start
//! epoch second, user-day buckets by `{user}-{day}`. Amounts and rates are
//! 256-bit unsigned integers (no floating point in financial totals); counts and
//! timestamps are u64. Entities serialize to the camelCase JSON shape the
//! dashboard queries expect.

use alloy::primitives::U256;
use serde::Serialize;

/// Fixed-width day partition for daily rollups.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Singleton id of the protocol-wide stats row.
pub const PROTOCOL_STATS_ID: &str = "PROTOCOL_STATS";

/// Truncate a timestamp to its day-bucket start. Pure; the same timestamp
/// always maps to the same bucket.
pub fn day_bucket(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY * SECONDS_PER_DAY
}

/// User id: 0x-prefixed lowercase hex of the 20-byte address.
pub fn user_id(address: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(address))
}

/// Transaction hash as 0x-prefixed lowercase hex.
pub fn tx_hash_hex(tx_hash: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(tx_hash))
}

/// Per-event record id: `{tx_hash}-{log_index}`. Unique even for multiple
/// events in the same block.
pub fn record_id(tx_hash: &[u8; 32], log_index: u64) -> String {
    format!("0x{}-{}", hex::encode(tx_hash), log_index)
}

/// User-day bucket id: `{user_id}-{day}`.
pub fn user_day_id(user_id: &str, day: u64) -> String {
    format!("{}-{}", user_id, day)
}

/// Per-address running totals. Created lazily on first event referencing the
/// address; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Sum of stakes minus withdrawals minus emergency-removed principal.
    pub total_staked: U256,
    /// Lifetime rewards paid out.
    pub total_claimed: U256,
    /// Lifetime principal removed through the emergency path.
    pub total_emergency_withdrawn: U256,
    /// Set exactly once, on the address's first Staked event.
    pub first_stake_time: Option<u64>,
    pub last_activity_time: u64,
    /// Derived: true iff total_staked > 0.
    pub is_active: bool,
}

impl User {
    pub fn new(id: String) -> Self {
        Self {
            id,
            total_staked: U256::ZERO,
            total_claimed: U256::ZERO,
            total_emergency_withdrawn: U256::ZERO,
            first_stake_time: None,
            last_activity_time: 0,
            is_active: false,
        }
    }
}

/// Append-only record of one Staked event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPosition {
    pub id: String,
    pub user: String,
    pub amount: U256,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    /// Protocol-wide total after this stake, as emitted by the contract.
    pub new_total_staked: U256,
    pub current_reward_rate: U256,
    pub is_active: bool,
}

/// Append-only record of one Withdrawn event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub user: String,
    pub amount: U256,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    pub new_total_staked: U256,
    pub current_reward_rate: U256,
    pub rewards_accrued: U256,
}

/// Append-only record of one RewardsClaimed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardClaim {
    pub id: String,
    pub user: String,
    pub amount: U256,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    pub new_pending_rewards: U256,
    /// Staked principal as reported by the event; claiming does not change it.
    pub total_staked: U256,
}

/// Append-only record of one EmergencyWithdrawn event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyWithdrawal {
    pub id: String,
    pub user: String,
    pub amount: U256,
    pub penalty: U256,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    pub new_total_staked: U256,
}

/// Append-only record of a global reward-rate change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateUpdate {
    pub id: String,
    pub old_rate: U256,
    pub new_rate: U256,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    /// Total staked at the time of the change, as reported by the event.
    pub total_staked: U256,
}

/// Protocol-wide running totals. Exactly one row, id [PROTOCOL_STATS_ID].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStats {
    pub id: String,
    /// Authoritative copy of the contract's newTotalStaked; overwritten, never
    /// recomputed here.
    pub total_staked: U256,
    /// Count of addresses whose first-ever stake has been seen.
    pub total_users: u64,
    pub total_rewards_claimed: U256,
    pub total_emergency_withdrawals: u64,
    pub current_reward_rate: U256,
    pub total_staking_positions: u64,
    pub total_withdrawals: u64,
    pub last_updated: u64,
}

impl ProtocolStats {
    pub fn new() -> Self {
        Self {
            id: PROTOCOL_STATS_ID.to_string(),
            total_staked: U256::ZERO,
            total_users: 0,
            total_rewards_claimed: U256::ZERO,
            total_emergency_withdrawals: 0,
            current_reward_rate: U256::ZERO,
            total_staking_positions: 0,
            total_withdrawals: 0,
            last_updated: 0,
        }
    }
}

impl Default for ProtocolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-day protocol rollup, keyed by the day-bucket start timestamp.
///
/// `total_staked`, `total_users` and `current_reward_rate` are point-in-time
/// (value as of the last event that day); the `daily_*` fields accumulate
/// within the day only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProtocolSnapshot {
    pub id: String,
    pub date: u64,
    pub total_staked: U256,
    pub total_users: u64,
    pub daily_staked: U256,
    pub daily_withdrawn: U256,
    pub daily_rewards_claimed: U256,
    pub daily_emergency_withdrawals: U256,
    /// First-ever stakes that landed in this bucket.
    pub new_users_count: u64,
    pub current_reward_rate: U256,
}

impl DailyProtocolSnapshot {
    pub fn new(day: u64) -> Self {
        Self {
            id: day.to_string(),
            date: day,
            total_staked: U256::ZERO,
            total_users: 0,
            daily_staked: U256::ZERO,
            daily_withdrawn: U256::ZERO,
            daily_rewards_claimed: U256::ZERO,
            daily_emergency_withdrawals: U256::ZERO,
            new_users_count: 0,
            current_reward_rate: U256::ZERO,
        }
    }
}

/// Per-user per-day rollup, keyed by `{user}-{day}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDailySnapshot {
    pub id: String,
    pub user: String,
    pub date: u64,
    /// User's running total as of the last event that day.
    pub total_staked: U256,
    pub pending_rewards: U256,
    pub daily_staked: U256,
    pub daily_withdrawn: U256,
    pub daily_rewards_claimed: U256,
}

impl UserDailySnapshot {
    pub fn new(user: String, day: u64) -> Self {
        Self {
            id: user_day_id(&user, day),
            user,
            date: day,
            total_staked: U256::ZERO,
            pending_rewards: U256::ZERO,
            daily_staked: U256::ZERO,
            daily_withdrawn: U256::ZERO,
            daily_rewards_claimed: U256::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bucket_boundaries() {
        assert_eq!(day_bucket(0), 0);
        assert_eq!(day_bucket(100), 0);
        assert_eq!(day_bucket(86_399), 0);
        assert_eq!(day_bucket(86_400), 86_400);
        assert_eq!(day_bucket(172_799), 86_400);
    }

    #[test]
    fn user_id_is_lowercase_hex() {
        let mut addr = [0u8; 20];
        addr[0] = 0xAB;
        addr[19] = 0xCD;
        let id = user_id(&addr);
        assert_eq!(id.len(), 42);
        assert!(id.starts_with("0xab"));
        assert!(id.ends_with("cd"));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn record_id_disambiguates_same_block() {
        let tx = [0x11u8; 32];
        let a = record_id(&tx, 0);
        let b = record_id(&tx, 1);
        assert_ne!(a, b);
        assert!(a.starts_with("0x1111"));
        assert!(a.ends_with("-0"));
    }

    #[test]
    fn user_day_id_shape() {
        assert_eq!(user_day_id("0xaa", 86_400), "0xaa-86400");
    }
}

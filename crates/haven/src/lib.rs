//! Off-chain StakeHaven runtime: staking-event indexing and read-model
//! aggregation for the StakingContract.
//!
//! - **StakingIndexer**: observed-only indexing of the contract's six events
//!   (WebSocket + HTTP backfill; no reorg safety or confirmations in the
//!   indexer itself).
//! - **Aggregator**: strictly sequential fold of the observed stream into the
//!   read-model [Ledger] (per-user totals, append-only activity records,
//!   protocol stats, per-day rollups), with a causal-order guard. Running
//!   totals are the contract's own `newTotalStaked` values, recorded as
//!   emitted, never recomputed here.

pub mod abi;
pub mod aggregator;
pub mod config;
pub mod cursor;
pub mod indexer;
pub mod model;
pub mod store;

pub use abi::{DecodedLog, EventPayload, ObservedEvent};
pub use aggregator::{Aggregator, AggregatorError};
pub use config::{IndexerConfig, ReconnectionConfig};
pub use cursor::{Cursor, StreamPosition};
pub use indexer::StakingIndexer;
pub use model::{
    day_bucket, record_id, user_day_id, user_id, DailyProtocolSnapshot, EmergencyWithdrawal,
    ProtocolStats, RewardClaim, RewardRateUpdate, StakingPosition, User, UserDailySnapshot,
    Withdrawal, PROTOCOL_STATS_ID, SECONDS_PER_DAY,
};
pub use store::Ledger;

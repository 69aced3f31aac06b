//! ABI types and decoding for the StakingContract.
//!
//! Six events; `user` is the only indexed parameter, every remaining parameter
//! is a static uint256 in the data section. Decode from the JSON-RPC log shape
//! (eth_getLogs / eth_subscription results).

use alloy::primitives::U256;
use anyhow::{Context, Result};
use serde_json::Value;

/// First 4 bytes of keccak256("Staked(address,uint256,uint256,uint256)").
pub const STAKED_TOPIC0: [u8; 4] = [0xb4, 0xca, 0xaf, 0x29];

/// First 4 bytes of keccak256("Withdrawn(address,uint256,uint256,uint256,uint256)").
pub const WITHDRAWN_TOPIC0: [u8; 4] = [0x94, 0xff, 0xd6, 0xb8];

/// First 4 bytes of keccak256("RewardsClaimed(address,uint256,uint256,uint256)").
pub const REWARDS_CLAIMED_TOPIC0: [u8; 4] = [0x56, 0x25, 0x3d, 0x28];

/// First 4 bytes of keccak256("EmergencyWithdrawn(address,uint256,uint256,uint256)").
pub const EMERGENCY_WITHDRAWN_TOPIC0: [u8; 4] = [0x45, 0xdf, 0x01, 0x18];

/// First 4 bytes of keccak256("RewardRateUpdated(uint256,uint256,uint256)").
pub const REWARD_RATE_UPDATED_TOPIC0: [u8; 4] = [0x69, 0x15, 0x50, 0x44];

/// First 4 bytes of keccak256("StakingInitialized(uint256)").
pub const STAKING_INITIALIZED_TOPIC0: [u8; 4] = [0xa9, 0x22, 0x1b, 0x3e];

/// Decoded event parameters. Closed set: the aggregator dispatches on this
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    Staked {
        user: [u8; 20],
        amount: U256,
        new_total_staked: U256,
        current_reward_rate: U256,
    },
    Withdrawn {
        user: [u8; 20],
        amount: U256,
        new_total_staked: U256,
        current_reward_rate: U256,
        rewards_accrued: U256,
    },
    RewardsClaimed {
        user: [u8; 20],
        amount: U256,
        new_pending_rewards: U256,
        total_staked: U256,
    },
    EmergencyWithdrawn {
        user: [u8; 20],
        amount: U256,
        penalty: U256,
        new_total_staked: U256,
    },
    RewardRateUpdated {
        old_rate: U256,
        new_rate: U256,
        total_staked: U256,
    },
    Initialized {
        initial_reward_rate: U256,
    },
}

impl EventPayload {
    /// Event name, for logging and display.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Staked { .. } => "Staked",
            EventPayload::Withdrawn { .. } => "Withdrawn",
            EventPayload::RewardsClaimed { .. } => "RewardsClaimed",
            EventPayload::EmergencyWithdrawn { .. } => "EmergencyWithdrawn",
            EventPayload::RewardRateUpdated { .. } => "RewardRateUpdated",
            EventPayload::Initialized { .. } => "StakingInitialized",
        }
    }
}

/// A decoded log in wire shape: causal position plus payload. The block
/// timestamp is present only when the node attaches `blockTimestamp` to logs;
/// the indexer resolves it otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub block_number: u64,
    pub tx_hash: [u8; 32],
    pub log_index: u64,
    pub block_timestamp: Option<u64>,
    pub payload: EventPayload,
}

impl DecodedLog {
    /// Promote to a stream element once the timestamp is known.
    pub fn into_observed(self, timestamp: u64) -> ObservedEvent {
        ObservedEvent {
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            timestamp,
            payload: self.payload,
        }
    }
}

/// Observed staking event with chain metadata (observed-only; no reorg safety).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    pub block_number: u64,
    pub tx_hash: [u8; 32],
    pub log_index: u64,
    pub timestamp: u64,
    pub payload: EventPayload,
}

/// Decode a JSON-RPC log into a [DecodedLog]. Returns Ok(None) for logs whose
/// topic0 is not one of the six staking events (address-only filters surface
/// foreign logs); errors only on malformed known events.
pub fn decode_log(log_value: &Value) -> Result<Option<DecodedLog>> {
    let topics = log_value
        .get("topics")
        .and_then(|t| t.as_array())
        .ok_or_else(|| anyhow::anyhow!("Missing topics"))?;
    let topic0 = match topics.first().and_then(|t| t.as_str()) {
        Some(s) => parse_hex_bytes(s)?,
        None => return Ok(None),
    };
    if topic0.len() < 4 {
        return Ok(None);
    }
    let prefix = [topic0[0], topic0[1], topic0[2], topic0[3]];

    let block_number = parse_hex_u64(
        log_value
            .get("blockNumber")
            .and_then(|n| n.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing blockNumber"))?,
    )?;
    let log_index = parse_hex_u64(
        log_value
            .get("logIndex")
            .and_then(|n| n.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing logIndex"))?,
    )?;
    let tx_hash = parse_hex_bytes_32(
        log_value
            .get("transactionHash")
            .and_then(|h| h.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing transactionHash"))?,
    )?;
    // Some nodes (geth >= 1.14, reth) attach the block timestamp to each log.
    let block_timestamp = log_value
        .get("blockTimestamp")
        .and_then(|t| t.as_str())
        .and_then(|s| parse_hex_u64(s).ok());
    let data = parse_hex_bytes(
        log_value
            .get("data")
            .and_then(|d| d.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing data"))?,
    )?;

    let payload = match prefix {
        STAKED_TOPIC0 => EventPayload::Staked {
            user: indexed_address(topics, 1)?,
            amount: word(&data, 0)?,
            new_total_staked: word(&data, 1)?,
            current_reward_rate: word(&data, 2)?,
        },
        WITHDRAWN_TOPIC0 => EventPayload::Withdrawn {
            user: indexed_address(topics, 1)?,
            amount: word(&data, 0)?,
            new_total_staked: word(&data, 1)?,
            current_reward_rate: word(&data, 2)?,
            rewards_accrued: word(&data, 3)?,
        },
        REWARDS_CLAIMED_TOPIC0 => EventPayload::RewardsClaimed {
            user: indexed_address(topics, 1)?,
            amount: word(&data, 0)?,
            new_pending_rewards: word(&data, 1)?,
            total_staked: word(&data, 2)?,
        },
        EMERGENCY_WITHDRAWN_TOPIC0 => EventPayload::EmergencyWithdrawn {
            user: indexed_address(topics, 1)?,
            amount: word(&data, 0)?,
            penalty: word(&data, 1)?,
            new_total_staked: word(&data, 2)?,
        },
        REWARD_RATE_UPDATED_TOPIC0 => EventPayload::RewardRateUpdated {
            old_rate: word(&data, 0)?,
            new_rate: word(&data, 1)?,
            total_staked: word(&data, 2)?,
        },
        STAKING_INITIALIZED_TOPIC0 => EventPayload::Initialized {
            initial_reward_rate: word(&data, 0)?,
        },
        _ => return Ok(None),
    };

    Ok(Some(DecodedLog {
        block_number,
        tx_hash,
        log_index,
        block_timestamp,
        payload,
    }))
}

/// i-th 32-byte data word as U256.
fn word(data: &[u8], i: usize) -> Result<U256> {
    let start = i * 32;
    let end = start + 32;
    if data.len() < end {
        anyhow::bail!("Data too short for word {} (len {})", i, data.len());
    }
    Ok(U256::from_be_slice(&data[start..end]))
}

/// Indexed address from topics[i] (32 bytes, left-padded).
fn indexed_address(topics: &[Value], i: usize) -> Result<[u8; 20]> {
    let s = topics
        .get(i)
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing topic{}", i))?;
    parse_hex_bytes_20(s)
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("parse hex u64")
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).context("parse hex bytes")
}

fn parse_hex_bytes_32(s: &str) -> Result<[u8; 32]> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn parse_hex_bytes_20(s: &str) -> Result<[u8; 20]> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() == 20 {
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(out)
    } else if bytes.len() == 32 {
        // Indexed address in EVM is 32 bytes (left-padded); take last 20.
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes[12..32]);
        Ok(out)
    } else {
        anyhow::bail!("Expected 20 or 32 bytes for address, got {}", bytes.len());
    }
}

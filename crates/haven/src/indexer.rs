//! StakingIndexer: observed-only indexing of StakingContract events.
//!
//! Subscribes via WebSocket, backfills via HTTP on startup/reconnect, resolves
//! block timestamps, and broadcasts [ObservedEvent]s. Backfill chunks are
//! sorted by (block_number, log_index); no reorg safety or confirmations in
//! this layer (the aggregator's ordering guard is the downstream contract).

use crate::abi::{decode_log, DecodedLog, ObservedEvent};
use crate::config::IndexerConfig;
use crate::cursor::Cursor;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Address-only logs filter; topic dispatch happens client-side in decode
/// (six event kinds from one contract).
fn build_logs_filter(address: &[u8; 20], from_block: Option<u64>, to_block: Option<u64>) -> Value {
    let mut filter = json!({
        "address": format!("0x{}", hex::encode(address)),
    });
    if let Some(from) = from_block {
        filter["fromBlock"] = Value::String(format!("0x{:x}", from));
    }
    if let Some(to) = to_block {
        filter["toBlock"] = Value::String(format!("0x{:x}", to));
    }
    filter
}

async fn http_json_rpc(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .context("HTTP request failed")?;
    let json: Value = resp.json().await.context("parse response")?;
    if let Some(err) = json.get("error") {
        anyhow::bail!("RPC error: {}", err);
    }
    let result = json
        .get("result")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Missing result"))?;
    Ok(result)
}

async fn eth_block_number(client: &reqwest::Client, http_url: &str) -> Result<u64> {
    let result = http_json_rpc(client, http_url, "eth_blockNumber", json!([]), 1).await?;
    let s = result
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("blockNumber not string"))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("parse block number")
}

async fn eth_get_logs(client: &reqwest::Client, http_url: &str, filter: Value) -> Result<Vec<Value>> {
    let result = http_json_rpc(client, http_url, "eth_getLogs", json!([filter]), 2).await?;
    let arr = result
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("getLogs not array"))?;
    Ok(arr.clone())
}

async fn eth_block_timestamp(
    client: &reqwest::Client,
    http_url: &str,
    block_number: u64,
) -> Result<u64> {
    let params = json!([format!("0x{:x}", block_number), false]);
    let result = http_json_rpc(client, http_url, "eth_getBlockByNumber", params, 3).await?;
    let s = result
        .get("timestamp")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("block {} missing timestamp", block_number))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("parse block timestamp")
}

/// Per-connection memo of block timestamps. Logs from nodes that attach
/// `blockTimestamp` never hit the network here.
#[derive(Default)]
struct BlockTimestamps {
    cache: HashMap<u64, u64>,
}

impl BlockTimestamps {
    async fn resolve(
        &mut self,
        client: &reqwest::Client,
        http_url: &str,
        decoded: &DecodedLog,
    ) -> Result<u64> {
        if let Some(ts) = decoded.block_timestamp {
            return Ok(ts);
        }
        if let Some(ts) = self.cache.get(&decoded.block_number) {
            return Ok(*ts);
        }
        let ts = eth_block_timestamp(client, http_url, decoded.block_number).await?;
        self.cache.insert(decoded.block_number, ts);
        Ok(ts)
    }
}

/// Staking indexer: follows StakingContract logs, backfills via HTTP,
/// broadcasts observed events.
pub struct StakingIndexer {
    config: IndexerConfig,
    event_tx: broadcast::Sender<ObservedEvent>,
}

impl StakingIndexer {
    pub fn new(config: IndexerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { config, event_tx }
    }

    /// Subscribe to observed events (ordered by block_number, log_index per
    /// backfill chunk; live tail in node delivery order).
    pub fn subscribe(&self) -> broadcast::Receiver<ObservedEvent> {
        self.event_tx.subscribe()
    }

    /// Run the indexer (blocking on the async loop). Call from a spawned task.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let config = &self.config;
        let http_client = reqwest::Client::new();
        let mut cursor = Cursor::new(config.start_block.saturating_sub(1));
        let reconnection = config.reconnection.clone();

        loop {
            match run_once(Arc::clone(&self), &http_client, &mut cursor, config).await {
                Ok(()) => {
                    sleep(Duration::from_secs(reconnection.initial_backoff_secs)).await;
                }
                Err(e) => {
                    tracing::warn!(reason = %e, "StakingIndexer failed, reconnecting...");
                    let base = std::cmp::min(
                        Duration::from_secs(reconnection.initial_backoff_secs) * 2,
                        Duration::from_secs(reconnection.max_backoff_secs),
                    );
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    sleep(base + jitter).await;
                }
            }
        }
    }
}

async fn run_once(
    indexer: Arc<StakingIndexer>,
    http_client: &reqwest::Client,
    cursor: &mut Cursor,
    config: &IndexerConfig,
) -> Result<()> {
    let mut timestamps = BlockTimestamps::default();

    let from_block = cursor.last_processed_block + 1;
    let tip = eth_block_number(http_client, &config.http_url).await?;
    if from_block <= tip {
        backfill(
            http_client,
            &config.http_url,
            &config.contract_address,
            from_block,
            tip,
            config.getlogs_max_range,
            &indexer.event_tx,
            &mut timestamps,
        )
        .await?;
        cursor.last_processed_block = tip;
    }

    let (ws_stream, _) = connect_async(&config.ws_url).await.context("WS connect")?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let sub_id = 1u64;
    let filter = build_logs_filter(&config.contract_address, None, None);
    let sub_req = json!({
        "jsonrpc": "2.0",
        "id": sub_id,
        "method": "eth_subscribe",
        "params": ["logs", filter]
    });
    ws_sender
        .send(Message::Text(serde_json::to_string(&sub_req)?))
        .await
        .map_err(|e| anyhow::anyhow!("send subscribe: {}", e))?;

    let needs_client_filter = match timeout(Duration::from_secs(10), ws_receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            let v: Value = serde_json::from_str(&text).context("parse sub response")?;
            if v.get("error").is_some() {
                let err = v["error"].get("message").and_then(|m| m.as_str()).unwrap_or("");
                if err.contains("data did not match") || err.contains("variant") {
                    tracing::warn!("RPC does not support logs filter (Anvil?), using client-side filter");
                    let sub_req_no_filter = json!({
                        "jsonrpc": "2.0",
                        "id": sub_id,
                        "method": "eth_subscribe",
                        "params": ["logs"]
                    });
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&sub_req_no_filter)?))
                        .await
                        .map_err(|e| anyhow::anyhow!("send subscribe: {}", e))?;
                    let text2 = timeout(Duration::from_secs(10), ws_receiver.next())
                        .await
                        .map_err(|_| anyhow::anyhow!("subscribe timeout"))?
                        .ok_or_else(|| anyhow::anyhow!("ws closed"))?
                        .map_err(|e| anyhow::anyhow!("ws: {}", e))?;
                    let msg = match text2 {
                        Message::Text(t) => t,
                        _ => anyhow::bail!("expected text"),
                    };
                    let v2: Value = serde_json::from_str(&msg)?;
                    v2["result"]
                        .as_str()
                        .ok_or_else(|| anyhow::anyhow!("no sub id"))?;
                    true
                } else {
                    anyhow::bail!("subscribe error: {}", err);
                }
            } else {
                v["result"]
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("no result"))?;
                false
            }
        }
        Ok(Some(Ok(_))) => anyhow::bail!("unexpected message"),
        Ok(Some(Err(e))) => return Err(anyhow::anyhow!("ws: {}", e)),
        Ok(None) => anyhow::bail!("ws closed"),
        Err(_) => anyhow::bail!("subscribe timeout"),
    };

    while let Some(msg) = ws_receiver.next().await {
        let text = match msg.map_err(|e| anyhow::anyhow!("ws: {}", e))? {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let v: Value = serde_json::from_str(&text).context("parse ws message")?;
        if v.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
            continue;
        }
        let result = v
            .get("params")
            .and_then(|p| p.get("result"))
            .ok_or_else(|| anyhow::anyhow!("no params.result"))?;
        if needs_client_filter && !log_matches_address(result, &config.contract_address) {
            continue;
        }
        let decoded = match decode_log(result).context("decode log")? {
            Some(d) => d,
            None => continue, // foreign event from the same contract
        };
        cursor.last_processed_block = cursor.last_processed_block.max(decoded.block_number);
        let timestamp = timestamps
            .resolve(http_client, &config.http_url, &decoded)
            .await?;
        let _ = indexer.event_tx.send(decoded.into_observed(timestamp));
    }
    Ok(())
}

fn log_matches_address(log: &Value, contract_address: &[u8; 20]) -> bool {
    let addr = match log.get("address").and_then(|a| a.as_str()) {
        Some(a) => a,
        None => return false,
    };
    let addr_bytes = match hex::decode(addr.strip_prefix("0x").unwrap_or(addr)) {
        Ok(b) if b.len() == 20 => b,
        _ => return false,
    };
    addr_bytes == contract_address
}

async fn backfill(
    client: &reqwest::Client,
    http_url: &str,
    contract_address: &[u8; 20],
    from_block: u64,
    to_block: u64,
    max_range: u64,
    event_tx: &broadcast::Sender<ObservedEvent>,
    timestamps: &mut BlockTimestamps,
) -> Result<()> {
    let mut from = from_block;
    while from <= to_block {
        let to = (from + max_range - 1).min(to_block);
        let filter = build_logs_filter(contract_address, Some(from), Some(to));
        let logs = eth_get_logs(client, http_url, filter).await?;
        let mut decoded: Vec<DecodedLog> = logs
            .iter()
            .filter_map(|log| {
                decode_log(log)
                    .map_err(|e| tracing::debug!(%e, "decode log skipped"))
                    .ok()
                    .flatten()
            })
            .collect();
        if !logs.is_empty() && decoded.is_empty() {
            tracing::debug!(raw_count = logs.len(), from, to, "backfill: no staking events in range");
        } else if !decoded.is_empty() {
            tracing::debug!(count = decoded.len(), from, to, "backfill: decoded events");
        }
        decoded.sort_by_key(|d| (d.block_number, d.log_index));
        for d in decoded {
            let timestamp = timestamps.resolve(client, http_url, &d).await?;
            let _ = event_tx.send(d.into_observed(timestamp));
        }
        from = to + 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_shape() {
        let f = build_logs_filter(&[0xab; 20], Some(16), Some(32));
        assert_eq!(f["address"], format!("0x{}", "ab".repeat(20)));
        assert_eq!(f["fromBlock"], "0x10");
        assert_eq!(f["toBlock"], "0x20");
        assert!(f.get("topics").is_none());
    }

    #[test]
    fn address_match_is_exact() {
        let log = json!({"address": format!("0x{}", "ab".repeat(20))});
        assert!(log_matches_address(&log, &[0xab; 20]));
        assert!(!log_matches_address(&log, &[0xac; 20]));
        assert!(!log_matches_address(&json!({}), &[0xab; 20]));
    }
}

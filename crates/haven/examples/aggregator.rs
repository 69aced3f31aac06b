//! Example: run the indexer and aggregator, printing protocol stats as JSON.
//!
//! Builds the indexer first, then folds each observed event into the ledger in
//! the main loop. Prints one-line JSON of the updated ProtocolStats after every
//! applied event. An out-of-order event is a fatal upstream violation and
//! stops the fold.
//!
//! Usage:
//!
//!   cargo run -p haven --example aggregator -- --ws-url <WS_URL> --http-url <HTTP_URL> --contract <STAKING_ADDRESS>
//!
//! Options:
//!   --start-block <N>  First block to backfill from. Default: 0.
//!   --top <N>          Print the top N stakers on shutdown. Default: 10.

use haven::{Aggregator, IndexerConfig, StakingIndexer};
use std::sync::Arc;

fn parse_contract_address(s: &str) -> Result<[u8; 20], String> {
    let addr_hex = s.strip_prefix("0x").unwrap_or(s);
    let addr_bytes = hex::decode(addr_hex).map_err(|e| e.to_string())?;
    if addr_bytes.len() != 20 {
        return Err("contract must be 20 bytes (40 hex chars)".into());
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&addr_bytes);
    Ok(out)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().collect();
    let mut ws_url = String::new();
    let mut http_url = String::new();
    let mut contract = String::new();
    let mut start_block = 0u64;
    let mut top: usize = 10;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ws-url" => {
                i += 1;
                ws_url = args.get(i).cloned().unwrap_or_default();
            }
            "--http-url" => {
                i += 1;
                http_url = args.get(i).cloned().unwrap_or_default();
            }
            "--contract" => {
                i += 1;
                contract = args.get(i).cloned().unwrap_or_default();
            }
            "--start-block" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    start_block = s.parse().unwrap_or(0);
                }
            }
            "--top" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    top = s.parse().unwrap_or(10);
                }
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: aggregator --ws-url <WS_URL> --http-url <HTTP_URL> --contract <STAKING_ADDRESS> [--start-block N] [--top N]\n\
                     Folds observed staking events into the read-model ledger; prints one-line\n\
                     JSON of ProtocolStats after each event, top stakers on shutdown."
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }
    if ws_url.is_empty() || http_url.is_empty() || contract.is_empty() {
        eprintln!("Usage: aggregator --ws-url <WS_URL> --http-url <HTTP_URL> --contract <STAKING_ADDRESS> [--start-block N] [--top N]");
        std::process::exit(1);
    }
    let contract_address = match parse_contract_address(&contract) {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = IndexerConfig {
        ws_url: ws_url.clone(),
        http_url: http_url.clone(),
        contract_address,
        start_block,
        getlogs_max_range: 1000,
        reconnection: Default::default(),
    };
    let indexer = Arc::new(StakingIndexer::new(config));
    let mut recv = indexer.subscribe();
    let indexer_clone = Arc::clone(&indexer);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let _ = indexer_clone.run().await;
        });
    });

    let mut aggregator = Aggregator::new();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        loop {
            tokio::select! {
                Ok(ev) = recv.recv() => {
                    if let Err(e) = aggregator.apply(&ev) {
                        tracing::error!(%e, kind = ev.payload.kind(), "stream violated causal order, stopping");
                        break;
                    }
                    if let Some(stats) = aggregator.ledger().protocol_stats() {
                        let json = serde_json::to_string(stats).unwrap();
                        println!("{}", json);
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    });

    for user in aggregator.ledger().top_stakers(top) {
        let json = serde_json::to_string(user).unwrap();
        eprintln!("{}", json);
    }
    Ok(())
}

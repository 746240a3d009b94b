//! Cardano deposit observer backed by the Blockfrost API
//!
//! Two-step query: recent transactions touching the custody address, then the
//! UTxO outputs of each candidate to find the lovelace actually delivered to
//! the address. Recent history only; an order's deposit is expected within
//! its expiry window, so ten transactions of lookback is plenty.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::{ChainObserver, IncomingTransfer};
use crate::config::AdaConfig;
use crate::error::{SwapError, SwapResult};
use crate::order::Network;

const LOVELACE_PER_ADA: f64 = 1_000_000.0;
const LOOKBACK_COUNT: u32 = 10;

pub struct BlockfrostObserver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BlockfrostObserver {
    pub fn new(config: &AdaConfig, timeout: Duration) -> SwapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.blockfrost_url.clone(),
            api_key: config.blockfrost_api_key.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> SwapResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("project_id", &self.api_key)
            .send()
            .await
            .map_err(|e| SwapError::Indexer {
                network: Network::Cardano,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SwapError::Indexer {
                network: Network::Cardano,
                message: format!("HTTP {} on {}", response.status(), path),
            });
        }

        response.json().await.map_err(|e| SwapError::Indexer {
            network: Network::Cardano,
            message: format!("decode: {}", e),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AddressTx {
    tx_hash: String,
    block_time: i64,
}

#[derive(Debug, Deserialize)]
struct TxUtxos {
    outputs: Vec<TxOutput>,
}

#[derive(Debug, Deserialize)]
struct TxOutput {
    address: String,
    amount: Vec<AssetQuantity>,
}

#[derive(Debug, Deserialize)]
struct AssetQuantity {
    unit: String,
    quantity: String,
}

/// Total ADA delivered to `address` by this transaction's outputs
fn ada_to_address(utxos: &TxUtxos, address: &str) -> f64 {
    let lovelace: u64 = utxos
        .outputs
        .iter()
        .filter(|o| o.address == address)
        .flat_map(|o| o.amount.iter())
        .filter(|a| a.unit == "lovelace")
        .filter_map(|a| a.quantity.parse::<u64>().ok())
        .sum();
    lovelace as f64 / LOVELACE_PER_ADA
}

#[async_trait]
impl ChainObserver for BlockfrostObserver {
    async fn query_incoming(
        &self,
        address: &str,
        not_before: DateTime<Utc>,
    ) -> SwapResult<Vec<IncomingTransfer>> {
        let listing: Vec<AddressTx> = self
            .get_json(&format!(
                "/addresses/{}/transactions?order=desc&count={}",
                address, LOOKBACK_COUNT
            ))
            .await?;

        let mut transfers = Vec::new();
        for tx in listing {
            let Some(timestamp) = DateTime::from_timestamp(tx.block_time, 0) else {
                warn!("Blockfrost returned unusable block_time for {}", tx.tx_hash);
                continue;
            };
            if timestamp < not_before {
                continue;
            }

            // Per-tx UTxO lookup; a failure here drops only this candidate
            let utxos: TxUtxos = match self.get_json(&format!("/txs/{}/utxos", tx.tx_hash)).await {
                Ok(utxos) => utxos,
                Err(e) => {
                    warn!("Skipping Cardano tx {}: {}", tx.tx_hash, e);
                    continue;
                }
            };

            let amount = ada_to_address(&utxos, address);
            if amount > 0.0 {
                transfers.push(IncomingTransfer {
                    tx_ref: tx.tx_hash,
                    amount,
                    timestamp,
                });
            }
        }

        Ok(transfers)
    }
}

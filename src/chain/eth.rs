//! Ethereum deposit observer backed by the Etherscan v2 account API
//!
//! One `txlist` call per query covers the whole custody address history,
//! which is far cheaper than scanning blocks over RPC. The response is
//! filtered down to confirmed incoming value transfers inside the order's
//! time window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChainObserver, IncomingTransfer};
use crate::config::EthConfig;
use crate::error::{SwapError, SwapResult};
use crate::order::Network;

const WEI_PER_ETH: f64 = 1e18;

pub struct EtherscanObserver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanObserver {
    pub fn new(config: &EthConfig, timeout: Duration) -> SwapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.etherscan_url.clone(),
            api_key: config.etherscan_api_key.clone(),
            chain_id: config.chain_id,
        })
    }
}

/// Etherscan envelope. `result` is a transaction list on success but a bare
/// string on errors, so it stays untyped until the status is known.
#[derive(Debug, Deserialize)]
struct TxListResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TxListEntry {
    hash: String,
    to: String,
    value: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    #[serde(rename = "isError", default)]
    is_error: String,
}

/// Filter a txlist payload down to incoming transfers inside the window.
/// Malformed entries are dropped rather than failing the whole query.
fn parse_txlist(
    response: &TxListResponse,
    address: &str,
    not_before: DateTime<Utc>,
) -> Vec<IncomingTransfer> {
    if response.status != "1" {
        // "0" covers both genuine errors and the empty-history case
        debug!("Etherscan returned status {}: {}", response.status, response.message);
        return Vec::new();
    }

    let entries: Vec<TxListEntry> = match serde_json::from_value(response.result.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Malformed Etherscan result, treating as empty: {}", e);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|tx| {
            if !tx.to.eq_ignore_ascii_case(address) {
                return None;
            }
            if tx.is_error == "1" {
                return None;
            }
            let timestamp = tx
                .time_stamp
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))?;
            if timestamp < not_before {
                return None;
            }
            let wei = tx.value.parse::<u128>().ok()?;
            Some(IncomingTransfer {
                tx_ref: tx.hash,
                amount: wei as f64 / WEI_PER_ETH,
                timestamp,
            })
        })
        .collect()
}

#[async_trait]
impl ChainObserver for EtherscanObserver {
    async fn query_incoming(
        &self,
        address: &str,
        not_before: DateTime<Utc>,
    ) -> SwapResult<Vec<IncomingTransfer>> {
        let url = format!(
            "{}?chainid={}&module=account&action=txlist&address={}&startblock=0&endblock=99999999&sort=desc&apikey={}",
            self.base_url, self.chain_id, address, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SwapError::Indexer {
                network: Network::Ethereum,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SwapError::Indexer {
                network: Network::Ethereum,
                message: format!("HTTP {}", response.status()),
            });
        }

        let payload: TxListResponse =
            response.json().await.map_err(|e| SwapError::Indexer {
                network: Network::Ethereum,
                message: format!("decode: {}", e),
            })?;

        Ok(parse_txlist(&payload, address, not_before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTODY: &str = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B";

    fn response(result: serde_json::Value) -> TxListResponse {
        TxListResponse {
            status: "1".to_string(),
            message: "OK".to_string(),
            result,
        }
    }

    #[test]
    fn parses_incoming_transfer() {
        let payload = response(serde_json::json!([{
            "hash": "0xdeadbeef",
            "to": CUSTODY.to_lowercase(),
            "from": "0xsomeone",
            "value": "500000000000000000",
            "timeStamp": "1700000100",
            "isError": "0"
        }]));

        let not_before = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let transfers = parse_txlist(&payload, CUSTODY, not_before);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].tx_ref, "0xdeadbeef");
        assert!((transfers[0].amount - 0.5).abs() < 1e-12);
    }

    #[test]
    fn drops_outgoing_failed_and_stale_transactions() {
        let not_before = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let payload = response(serde_json::json!([
            // Outgoing: `to` is not the custody address
            {"hash": "0x1", "to": "0xother", "value": "1", "timeStamp": "1700000100", "isError": "0"},
            // Reverted
            {"hash": "0x2", "to": CUSTODY, "value": "1", "timeStamp": "1700000100", "isError": "1"},
            // Before the window
            {"hash": "0x3", "to": CUSTODY, "value": "1", "timeStamp": "1699999999", "isError": "0"}
        ]));

        assert!(parse_txlist(&payload, CUSTODY, not_before).is_empty());
    }

    #[test]
    fn non_ok_status_is_empty() {
        let payload = TxListResponse {
            status: "0".to_string(),
            message: "No transactions found".to_string(),
            result: serde_json::json!(""),
        };
        let not_before = DateTime::from_timestamp(0, 0).unwrap();
        assert!(parse_txlist(&payload, CUSTODY, not_before).is_empty());
    }

    #[test]
    fn malformed_result_is_empty_not_fatal() {
        let payload = response(serde_json::json!("Max rate limit reached"));
        let not_before = DateTime::from_timestamp(0, 0).unwrap();
        assert!(parse_txlist(&payload, CUSTODY, not_before).is_empty());
    }
}

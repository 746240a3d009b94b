//! ADA settlement sender - payment submission through a cardano-wallet server
//!
//! Transaction building and signing stay inside cardano-wallet; this side
//! only posts a single-payment request and records the returned id.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use super::SettlementSender;
use crate::config::AdaConfig;
use crate::error::{SwapError, SwapResult};
use crate::order::Network;

const LOVELACE_PER_ADA: f64 = 1_000_000.0;

pub struct AdaSender {
    client: reqwest::Client,
    wallet_url: String,
    wallet_id: String,
    passphrase: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTransaction {
    id: String,
}

impl AdaSender {
    /// Build the sender from configuration. Returns `Ok(None)` when no
    /// wallet id is configured, making ADA settlement unavailable.
    pub fn from_config(config: &AdaConfig, timeout: Duration) -> SwapResult<Option<Self>> {
        if config.wallet_id.is_empty() {
            return Ok(None);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Config(format!("HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            wallet_url: config.wallet_url.clone(),
            wallet_id: config.wallet_id.clone(),
            passphrase: config.wallet_passphrase.clone(),
        }))
    }

    fn submission_error(message: String) -> SwapError {
        SwapError::Submission {
            network: Network::Cardano,
            message,
        }
    }
}

#[async_trait]
impl SettlementSender for AdaSender {
    fn network(&self) -> Network {
        Network::Cardano
    }

    async fn send(&self, recipient: &str, amount: f64) -> SwapResult<String> {
        let lovelace = (amount * LOVELACE_PER_ADA).round() as u64;

        let body = serde_json::json!({
            "passphrase": self.passphrase,
            "payments": [{
                "address": recipient,
                "amount": { "quantity": lovelace, "unit": "lovelace" }
            }]
        });

        let url = format!(
            "{}/v2/wallets/{}/transactions",
            self.wallet_url, self.wallet_id
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::submission_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Self::submission_error(format!(
                "HTTP {}: {}",
                status, detail
            )));
        }

        let created: CreatedTransaction = response
            .json()
            .await
            .map_err(|e| Self::submission_error(format!("decode: {}", e)))?;

        info!("ADA transaction submitted: {}", created.id);
        Ok(created.id)
    }
}

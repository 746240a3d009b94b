//! ETH settlement sender - plain value transfer signed by the custody wallet

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionRequest};
use ethers::utils::parse_ether;
use tracing::info;

use super::SettlementSender;
use crate::config::EthConfig;
use crate::error::{SwapError, SwapResult};
use crate::order::Network;

pub struct EthSender {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl EthSender {
    /// Build the sender from configuration. Returns `Ok(None)` when no
    /// signing key is configured: the whole ETH settlement capability is
    /// then unavailable and orders needing it stay parked.
    pub fn from_config(config: &EthConfig) -> SwapResult<Option<Self>> {
        if config.private_key.is_empty() {
            return Ok(None);
        }

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SwapError::Config(format!("Invalid ETH RPC URL: {}", e)))?;

        let wallet: LocalWallet = config
            .private_key
            .parse()
            .map_err(|e| SwapError::Config(format!("Invalid ETH private key: {}", e)))?;
        let wallet = wallet.with_chain_id(config.chain_id);

        info!("ETH sender initialized with wallet {:?}", wallet.address());

        Ok(Some(Self {
            client: SignerMiddleware::new(provider, wallet),
        }))
    }

    fn submission_error(message: String) -> SwapError {
        SwapError::Submission {
            network: Network::Ethereum,
            message,
        }
    }
}

#[async_trait]
impl SettlementSender for EthSender {
    fn network(&self) -> Network {
        Network::Ethereum
    }

    async fn send(&self, recipient: &str, amount: f64) -> SwapResult<String> {
        let to: Address = recipient
            .parse()
            .map_err(|_| SwapError::InvalidRecipient(recipient.to_string()))?;

        let value =
            parse_ether(amount).map_err(|e| Self::submission_error(format!("amount: {}", e)))?;

        let tx = TransactionRequest::pay(to, value);

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| Self::submission_error(e.to_string()))?;
        let tx_hash = *pending;

        info!("ETH transaction sent: {:?}", tx_hash);

        // Wait for inclusion; a dropped or reverted transfer is a failure
        let receipt = pending
            .await
            .map_err(|e| Self::submission_error(e.to_string()))?
            .ok_or_else(|| Self::submission_error("transaction dropped from mempool".into()))?;

        if receipt.status == Some(0u64.into()) {
            return Err(Self::submission_error(format!(
                "transaction {:?} reverted",
                tx_hash
            )));
        }

        Ok(format!("{:?}", tx_hash))
    }
}

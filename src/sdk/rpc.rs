//! JSON-RPC client for an Ethereum node.
//!
//! Transactions go out through `eth_sendTransaction`, so the node (or a
//! signing proxy in front of it) holds the keys.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::errors::RpcError;
use crate::primitives::{Address, H256, TxHash};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: String,
}

impl Log {
    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(self.data.trim_start_matches("0x")).context("Log data is not valid hex")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub block_number: Option<String>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() != Some("0x0")
    }

    /// First log emitted by `address` whose topic 0 is `topic`.
    pub fn find_log(&self, address: Address, topic: H256) -> Option<&Log> {
        self.logs
            .iter()
            .find(|log| log.address == address && log.topics.first() == Some(&topic))
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(
        url: impl Into<String>,
        poll_interval: Duration,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            poll_interval,
            confirmation_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Option<Value>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let transport = |source| RpcError::Transport {
            method: method.to_string(),
            source,
        };

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request_body(id, method, params))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        if let Some(err) = response.error {
            return Err(RpcError::Remote {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.filter(|v| !v.is_null()))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self
            .request(method, params)
            .await?
            .ok_or_else(|| RpcError::EmptyResult {
                method: method.to_string(),
            })?;
        serde_json::from_value(value).with_context(|| format!("Unexpected {} result", method))
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    /// The configured signer, or the node's first unlocked account.
    pub async fn resolve_signer(&self, configured: Option<Address>) -> Result<Address> {
        if let Some(signer) = configured {
            return Ok(signer);
        }
        let accounts = self.accounts().await?;
        Ok(accounts.first().copied().ok_or(RpcError::NoSigner)?)
    }

    pub async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<TxHash> {
        let tx = json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "value": "0x0",
            "data": format!("0x{}", hex::encode(data)),
        });
        let hash: TxHash = self.call("eth_sendTransaction", json!([tx])).await?;
        tracing::debug!(%from, %to, tx_hash = %hash, "Transaction submitted");
        Ok(hash)
    }

    pub async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>> {
        let value = self
            .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        value
            .map(serde_json::from_value)
            .transpose()
            .context("Unexpected eth_getTransactionReceipt result")
    }

    /// Poll until `tx_hash` is mined. Reverted transactions are errors.
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                if !receipt.succeeded() {
                    return Err(RpcError::Reverted { tx_hash }.into());
                }
                tracing::debug!(
                    tx_hash = %tx_hash,
                    block = ?receipt.block_number,
                    "Transaction mined"
                );
                return Ok(receipt);
            }
            if started.elapsed() >= self.confirmation_timeout {
                return Err(RpcError::ConfirmationTimeout {
                    tx_hash,
                    waited_secs: started.elapsed().as_secs(),
                }
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between polling attempts when waiting for readiness.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
/// Error responses keep the node's message and revert data so reverts can be matched on.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");

        match error.get("data").filter(|d| !d.is_null()) {
            Some(data) => anyhow::bail!("RPC error in {}: {} (data: {})", method, message, data),
            None => anyhow::bail!("RPC error in {}: {}", method, message),
        }
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Wait for a service to be ready by repeatedly calling a check function.
///
/// # Arguments
/// * `name` - Name of the service (for error messages)
/// * `timeout_secs` - Maximum time to wait in seconds
/// * `check_fn` - Function that returns Ok(()) when the service is ready
///
/// # Returns
/// Ok(()) when the service is ready, or an error after timeout.
pub async fn wait_until_ready<F, Fut>(
    name: &str,
    timeout_secs: u64,
    check_fn: F,
) -> Result<(), anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let max_duration = Duration::from_secs(timeout_secs);

    loop {
        if start.elapsed() > max_duration {
            anyhow::bail!("Timeout waiting for {} to be ready", name);
        }

        match check_fn().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, service = %name, "Readiness check failed, retrying...");
            }
        }

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

/// Deserialize a u64 from a hex string (with 0x prefix).
pub(crate) fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Format a quantity the way JSON-RPC expects it.
pub(crate) fn to_quantity(value: impl std::fmt::LowerHex) -> String {
    format!("0x{:x}", value)
}

/// A log entry emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
}

/// The subset of a transaction receipt the deployment scripts read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub status: u64,
    #[serde(default)]
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }

    /// Total fee paid for the transaction in wei.
    pub fn fee(&self) -> U256 {
        self.gas_used * self.effective_gas_price.unwrap_or_default()
    }
}

/// Parameters of an `eth_getLogs` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
    pub from_block: String,
    pub to_block: String,
}

impl LogFilter {
    /// Logs of `address` with first topic `topic0`, from `from_block` to the chain head.
    pub fn new(address: Address, topic0: B256, from_block: u64) -> Self {
        Self {
            address,
            topics: vec![topic0],
            from_block: to_quantity(from_block),
            to_block: "latest".to_string(),
        }
    }
}

/// JSON-RPC client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            url: url.into(),
        })
    }

    /// Send a raw JSON-RPC request.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        json_rpc_call(&self.client, &self.url, method, params).await
    }

    /// Wait until the endpoint answers `eth_chainId`.
    pub async fn wait_until_ready(&self, timeout_secs: u64) -> anyhow::Result<()> {
        wait_until_ready(&self.url, timeout_secs, || async {
            self.chain_id().await.map(|_| ())
        })
        .await
    }

    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    pub async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.request("eth_accounts", vec![]).await
    }

    pub async fn block_number(&self) -> anyhow::Result<u64> {
        let number: U64 = self.request("eth_blockNumber", vec![]).await?;
        Ok(number.to())
    }

    pub async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        self.request(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    /// The next nonce for `address`, counting pending transactions.
    pub async fn nonce(&self, address: Address) -> anyhow::Result<u64> {
        let nonce: U64 = self
            .request(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        Ok(nonce.to())
    }

    pub async fn gas_price(&self) -> anyhow::Result<u128> {
        let price: U256 = self.request("eth_gasPrice", vec![]).await?;
        Ok(price.saturating_to())
    }

    pub async fn max_priority_fee(&self) -> anyhow::Result<u128> {
        let fee: U256 = self.request("eth_maxPriorityFeePerGas", vec![]).await?;
        Ok(fee.saturating_to())
    }

    pub async fn estimate_gas(&self, tx: Value) -> anyhow::Result<u64> {
        let gas: U64 = self.request("eth_estimateGas", vec![tx]).await?;
        Ok(gas.to())
    }

    /// Execute a read-only call against the latest block.
    pub async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        self.request(
            "eth_call",
            vec![
                serde_json::json!({ "to": to, "data": data }),
                serde_json::json!("latest"),
            ],
        )
        .await
    }

    /// Send a transaction from an account unlocked on the node.
    pub async fn send_transaction(&self, tx: Value) -> anyhow::Result<B256> {
        self.request("eth_sendTransaction", vec![tx]).await
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<B256> {
        self.request("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    pub async fn logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<Log>> {
        self.request("eth_getLogs", vec![serde_json::to_value(filter)?])
            .await
    }

    /// Move the dev node's clock forward. Development chains only.
    pub async fn increase_time(&self, seconds: u64) -> anyhow::Result<()> {
        let _: Value = self
            .request("evm_increaseTime", vec![serde_json::json!(seconds)])
            .await?;
        Ok(())
    }

    /// Mine one block. Development chains only.
    pub async fn mine(&self) -> anyhow::Result<()> {
        let _: Value = self.request("evm_mine", vec![]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_deserialization() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "blockNumber": "0x1b4",
            "status": "0x1",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": [{
                "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                "topics": ["0x1d3015d7ba850fa198dc7b1a3f5d42779313a681035f77c8c03764c61005518d"],
                "data": "0x",
                "blockNumber": "0x1b4",
                "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
                "logIndex": "0x0"
            }]
        }))
        .unwrap();

        assert_eq!(receipt.block_number, 436);
        assert!(receipt.succeeded());
        assert!(receipt.contract_address.is_some());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.fee(), U256::from(21_000u64) * U256::from(1_000_000_000u64));
    }

    #[test]
    fn test_failed_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "blockNumber": "0x2",
            "status": "0x0",
            "contractAddress": null,
            "gasUsed": "0x5208",
            "logs": []
        }))
        .unwrap();

        assert!(!receipt.succeeded());
        assert_eq!(receipt.fee(), U256::ZERO);
    }

    #[test]
    fn test_log_filter_serialization() {
        let filter = LogFilter::new(Address::ZERO, B256::ZERO, 255);
        let value = serde_json::to_value(&filter).unwrap();

        assert_eq!(value["fromBlock"], "0xff");
        assert_eq!(value["toBlock"], "latest");
        assert_eq!(value["topics"].as_array().unwrap().len(), 1);
    }
}

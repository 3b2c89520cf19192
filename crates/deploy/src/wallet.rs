//! Sending transactions, either through the node's unlocked accounts or a local key.

use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};

use crate::rpc::{RpcClient, TransactionReceipt, to_quantity};

/// Interval between two receipt or block number polls.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on polls for the receipt, and again for the confirmations.
const MAX_POLLS: usize = 600;

/// Headroom added on top of the node's gas estimate, in percent.
const GAS_LIMIT_HEADROOM_PERCENT: u64 = 20;

/// A transaction to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    /// The callee, or `None` for a contract creation.
    pub to: Option<Address>,
    /// Wei attached to the call.
    pub value: U256,
    /// Calldata, or init code for a contract creation.
    pub data: Bytes,
}

impl TxRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn create(init_code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            value: U256::ZERO,
            data: init_code.into(),
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// The JSON-RPC transaction object for this request.
    pub(crate) fn to_json(&self, from: Address) -> serde_json::Value {
        let mut tx = serde_json::json!({
            "from": from,
            "value": to_quantity(self.value),
            "data": self.data,
        });
        if let Some(to) = self.to {
            tx["to"] = serde_json::json!(to);
        }
        tx
    }
}

/// The account transactions are sent from.
#[derive(Debug, Clone)]
pub enum Wallet {
    /// An account unlocked on the node. Transactions go through `eth_sendTransaction`.
    Unlocked(Address),
    /// A local key. Transactions are signed here and go through `eth_sendRawTransaction`.
    Local(PrivateKeySigner),
}

impl Wallet {
    /// Build a wallet from a hex-encoded private key.
    pub fn from_private_key(key: &str) -> anyhow::Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .context("Failed to parse deployer private key")?;
        Ok(Self::Local(signer))
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Unlocked(address) => *address,
            Self::Local(signer) => signer.address(),
        }
    }

    /// Send a transaction and return a handle to wait for it.
    pub async fn send(&self, rpc: &RpcClient, tx: TxRequest) -> anyhow::Result<PendingTransaction> {
        let hash = match self {
            Self::Unlocked(from) => rpc
                .send_transaction(tx.to_json(*from))
                .await
                .context("Failed to send transaction")?,
            Self::Local(signer) => {
                let raw = Self::sign(signer, rpc, &tx).await?;
                rpc.send_raw_transaction(raw)
                    .await
                    .context("Failed to send raw transaction")?
            }
        };

        tracing::debug!(tx_hash = %hash, from = %self.address(), to = ?tx.to, "Transaction sent");

        Ok(PendingTransaction::new(hash, rpc.clone()))
    }

    /// Fill in nonce, gas and fees from the node, then sign an EIP-1559 transaction.
    async fn sign(signer: &PrivateKeySigner, rpc: &RpcClient, tx: &TxRequest) -> anyhow::Result<Bytes> {
        let from = signer.address();
        let chain_id = rpc.chain_id().await?;
        let nonce = rpc.nonce(from).await?;
        let estimate = rpc
            .estimate_gas(tx.to_json(from))
            .await
            .context("Failed to estimate gas")?;
        let gas_limit = estimate + estimate * GAS_LIMIT_HEADROOM_PERCENT / 100;
        let max_priority_fee_per_gas = rpc.max_priority_fee().await?;
        let max_fee_per_gas = rpc.gas_price().await? * 2 + max_priority_fee_per_gas;

        let unsigned = TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: tx.to.map_or(TxKind::Create, TxKind::Call),
            value: tx.value,
            input: tx.data.clone(),
            ..Default::default()
        };

        let signature = signer
            .sign_hash_sync(&unsigned.signature_hash())
            .context("Failed to sign transaction")?;
        let envelope = TxEnvelope::from(unsigned.into_signed(signature));

        Ok(envelope.encoded_2718().into())
    }
}

/// A sent transaction that has not been waited on yet.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    hash: B256,
    rpc: RpcClient,
    poll_interval: Duration,
    max_polls: usize,
}

impl PendingTransaction {
    pub(crate) fn new(hash: B256, rpc: RpcClient) -> Self {
        Self {
            hash,
            rpc,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }

    /// Override how often and how many times the node is polled while waiting.
    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Wait until the transaction is mined and `confirmations` blocks (its own included) exist.
    ///
    /// Fails if the transaction reverted.
    pub async fn wait(self, confirmations: u64) -> anyhow::Result<TransactionReceipt> {
        let receipt = (|| async {
            self.rpc
                .transaction_receipt(self.hash)
                .await?
                .context("Transaction not mined yet")
        })
        .retry(self.backoff())
        .notify(|err, _| tracing::trace!(tx_hash = %self.hash, error = %err, "Waiting for receipt"))
        .await
        .with_context(|| format!("Failed to get receipt for transaction {}", self.hash))?;

        if !receipt.succeeded() {
            anyhow::bail!(
                "Transaction {} reverted in block {}",
                self.hash,
                receipt.block_number
            );
        }

        if confirmations > 1 {
            let target = receipt.block_number + confirmations - 1;
            tracing::info!(
                tx_hash = %self.hash,
                block = receipt.block_number,
                confirmations,
                "Waiting for confirmations..."
            );

            (|| async {
                let head = self.rpc.block_number().await?;
                if head < target {
                    anyhow::bail!("Chain head {} is below block {}", head, target);
                }
                Ok(())
            })
            .retry(self.backoff())
            .notify(|err, _| tracing::trace!(tx_hash = %self.hash, error = %err, "Waiting for block"))
            .await
            .with_context(|| {
                format!(
                    "Gave up waiting for {} confirmations of transaction {}",
                    confirmations, self.hash
                )
            })?;
        }

        Ok(receipt)
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls)
    }
}

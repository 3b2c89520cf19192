//! Source verification on Etherscan (v2 multichain API).

use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{artifacts::BuildInfo, rpc::create_client};

/// Default Etherscan v2 endpoint.
pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Etherscan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanConfig {
    pub api_url: String,
    /// Seconds between two status checks.
    pub poll_interval_secs: u64,
    /// Status checks before giving up.
    pub max_polls: usize,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: 5,
            max_polls: 24,
        }
    }
}

/// Everything Etherscan needs to match a deployed contract with its sources.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// e.g. `contracts/Raffle.sol:Raffle`.
    pub contract_name: String,
    pub build_info: BuildInfo,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// Result of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Verified {
    #[display("verified")]
    Now,
    #[display("already verified")]
    Already,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Guid(String),
    AlreadyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Pass,
    AlreadyVerified,
    Pending,
}

/// Marker for a verification still queued on Etherscan's side.
#[derive(Debug, Display)]
#[display("Verification still pending")]
struct StillPending;

impl std::error::Error for StillPending {}

fn is_already_verified(result: &str) -> bool {
    result.to_lowercase().contains("already verified")
}

fn classify_submission(response: EtherscanResponse) -> anyhow::Result<Submission> {
    if response.status == "1" {
        return Ok(Submission::Guid(response.result));
    }
    if is_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }
    anyhow::bail!(
        "Etherscan rejected the verification request: {} ({})",
        response.result,
        response.message
    )
}

fn classify_status(response: EtherscanResponse) -> anyhow::Result<Status> {
    if is_already_verified(&response.result) {
        return Ok(Status::AlreadyVerified);
    }
    if response.status == "1" {
        return Ok(Status::Pass);
    }
    if response.result.to_lowercase().contains("pending") {
        return Ok(Status::Pending);
    }
    anyhow::bail!("Verification failed: {}", response.result)
}

/// Client for the Etherscan verification endpoints of one chain.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: EtherscanConfig,
    api_key: String,
    chain_id: u64,
}

impl EtherscanVerifier {
    pub fn new(config: EtherscanConfig, api_key: impl Into<String>, chain_id: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            config,
            api_key: api_key.into(),
            chain_id,
        })
    }

    /// Submit the sources and wait for Etherscan's verdict.
    pub async fn verify(&self, request: &VerificationRequest) -> anyhow::Result<Verified> {
        tracing::info!(address = %request.address, contract = %request.contract_name, "Verifying contract...");

        let guid = match self.submit(request).await? {
            Submission::AlreadyVerified => return Ok(Verified::Already),
            Submission::Guid(guid) => guid,
        };
        tracing::debug!(%guid, "Verification submitted");

        let status = (|| async {
            match self.check_status(&guid).await? {
                Status::Pending => Err(anyhow::Error::new(StillPending)),
                status => Ok(status),
            }
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(Duration::from_secs(self.config.poll_interval_secs))
                .with_max_times(self.config.max_polls),
        )
        .when(|e| e.is::<StillPending>())
        .notify(|_, _| tracing::debug!(%guid, "Verification pending"))
        .await?;

        Ok(match status {
            Status::AlreadyVerified => Verified::Already,
            _ => Verified::Now,
        })
    }

    /// Verify, logging failures instead of returning them.
    pub async fn verify_or_warn(&self, request: &VerificationRequest) {
        match self.verify(request).await {
            Ok(outcome) => {
                tracing::info!(address = %request.address, %outcome, "✓ Contract verified")
            }
            Err(e) => tracing::warn!(address = %request.address, error = %e, "Verification failed"),
        }
    }

    async fn submit(&self, request: &VerificationRequest) -> anyhow::Result<Submission> {
        let source = serde_json::to_string(&request.build_info.input)
            .context("Failed to serialize compiler input")?;
        let compiler_version = format!("v{}", request.build_info.solc_long_version);
        let address = request.address.to_string();
        let constructor_args = hex::encode(&request.constructor_args);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", compiler_version.as_str()),
            // Misspelled on Etherscan's side.
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response: EtherscanResponse = self
            .client
            .post(&self.config.api_url)
            .query(&[("chainid", self.chain_id.to_string())])
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        classify_submission(response)
    }

    async fn check_status(&self, guid: &str) -> anyhow::Result<Status> {
        let chain_id = self.chain_id.to_string();
        let response: EtherscanResponse = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to check verification status")?
            .json()
            .await
            .context("Failed to parse verification status")?;

        classify_status(response)
    }
}

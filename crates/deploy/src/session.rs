//! A connection to the target network, shared by deployment scripts and helper commands.

use alloy_core::primitives::{Address, U256, utils::format_ether};
use anyhow::{Context, Result};
use chrono::Utc;

use crate::{
    artifacts::ArtifactStore,
    config::RaffleConfig,
    deployments::{Deployment, DeploymentStore},
    dev_chain::DevChain,
    network::{Network, NetworkConfig, NetworkConfigItem},
    rpc::RpcClient,
    wallet::{TxRequest, Wallet},
};

/// Environment variable holding the Etherscan API key. Verification only runs when set.
pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

/// Environment variable enabling the front-end sync.
pub const UPDATE_FRONT_END_ENV: &str = "UPDATE_FRONT_END";

/// Environment variable holding the deployer key, used on live networks without a configured key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Seconds to wait for an existing node to answer.
const NODE_READY_TIMEOUT_SECS: u64 = 10;

/// Switches read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptEnv {
    pub etherscan_api_key: Option<String>,
    pub update_front_end: bool,
}

impl ScriptEnv {
    pub fn from_env() -> Self {
        Self {
            etherscan_api_key: non_empty_var(ETHERSCAN_API_KEY_ENV),
            update_front_end: non_empty_var(UPDATE_FRONT_END_ENV).is_some(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// A contract deployment to perform.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub contract_name: &'a str,
    /// ABI-encoded constructor arguments.
    pub encoded_args: Vec<u8>,
    /// Constructor arguments as recorded in the deployment file.
    pub display_args: Vec<String>,
    pub confirmations: u64,
}

/// Everything a script needs to act on one network.
pub struct Session {
    pub config: RaffleConfig,
    pub network: Network,
    pub network_config: NetworkConfig,
    pub rpc: RpcClient,
    /// The `deployer` named account.
    pub wallet: Wallet,
    pub artifacts: ArtifactStore,
    pub deployments: DeploymentStore,
    pub env: ScriptEnv,
    /// Keeps the ephemeral dev chain alive for the session.
    dev_chain: Option<DevChain>,
}

impl Session {
    /// Connect to a configured network, starting a dev chain when the network is ephemeral.
    pub async fn connect(config: RaffleConfig, network_name: &str) -> Result<Self> {
        let network = config.network(network_name)?;

        let (url, dev_chain) = match network.rpc_url()? {
            Some(url) => (url, None),
            None => {
                tracing::info!(network = %network.name, "Starting ephemeral dev chain...");
                let dev_chain = config.dev_chain.start().await?;
                (dev_chain.url.clone(), Some(dev_chain))
            }
        };

        let rpc = RpcClient::new(url.as_str())?;
        rpc.wait_until_ready(NODE_READY_TIMEOUT_SECS)
            .await
            .with_context(|| format!("Node for network {} is not reachable at {}", network.name, url))?;

        let chain_id = rpc.chain_id().await?;
        if chain_id != network.chain_id() {
            anyhow::bail!(
                "Network {} is configured with chain id {}, but the node at {} reports {}",
                network.name,
                network.chain_id(),
                url,
                chain_id
            );
        }

        let wallet = Self::select_wallet(&network, &rpc).await?;

        let deployments = if network.is_ephemeral() {
            DeploymentStore::ephemeral(chain_id)
        } else {
            DeploymentStore::persistent(&config.deployments, &network.name, chain_id)
        };

        tracing::info!(
            network = %network.name,
            chain_id,
            deployer = %wallet.address(),
            development = network.is_development(),
            "Connected"
        );

        Ok(Self {
            network_config: config.network_config(),
            artifacts: ArtifactStore::new(config.artifacts.clone()),
            config,
            network,
            rpc,
            wallet,
            deployments,
            env: ScriptEnv::from_env(),
            dev_chain,
        })
    }

    /// The configured key if any, else the node's first account on development chains.
    async fn select_wallet(network: &Network, rpc: &RpcClient) -> Result<Wallet> {
        if let Some(key) = &network.settings.private_key {
            return Wallet::from_private_key(key);
        }

        if !network.is_development() {
            let key = non_empty_var(PRIVATE_KEY_ENV).with_context(|| {
                format!(
                    "No deployer key for network {}. Set networks.{}.private_key or {}",
                    network.name, network.name, PRIVATE_KEY_ENV
                )
            })?;
            return Wallet::from_private_key(&key);
        }

        let accounts = rpc.accounts().await?;
        let deployer = accounts
            .first()
            .copied()
            .context("The node has no unlocked accounts")?;
        Ok(Wallet::Unlocked(deployer))
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    /// Whether this session runs on an ephemeral dev chain.
    pub fn is_ephemeral(&self) -> bool {
        self.dev_chain.is_some()
    }

    /// Raffle parameters of the active chain.
    pub fn chain_params(&self) -> Result<&NetworkConfigItem> {
        self.network_config.get(self.chain_id())
    }

    /// Address of a previously deployed contract.
    pub fn contract_address(&mut self, name: &str) -> Result<Address> {
        Ok(self.deployments.get(name)?.address)
    }

    /// Deploy a contract from its artifact and record it.
    pub async fn deploy(&mut self, request: DeployRequest<'_>) -> Result<Deployment> {
        let artifact = self.artifacts.load(request.contract_name)?;
        let init_code = artifact.init_code(&request.encoded_args);

        let pending = self
            .wallet
            .send(&self.rpc, TxRequest::create(init_code))
            .await
            .with_context(|| format!("Failed to deploy {}", request.contract_name))?;

        tracing::info!(
            contract = request.contract_name,
            tx_hash = %pending.hash(),
            "Deploying..."
        );

        let receipt = pending.wait(request.confirmations).await?;
        let address = receipt
            .contract_address
            .with_context(|| format!("No contract address in the receipt of {}", request.contract_name))?;

        tracing::info!(
            contract = request.contract_name,
            %address,
            block = receipt.block_number,
            gas_used = %receipt.gas_used,
            fee_eth = %format_ether(receipt.fee()),
            "✓ Deployed"
        );

        let deployment = Deployment {
            address,
            abi: artifact.abi,
            args: request.display_args,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            deployed_at: Utc::now(),
        };
        self.deployments.save(request.contract_name, deployment.clone())?;

        Ok(deployment)
    }

    /// Dev node accounts other than the deployer.
    pub async fn players(&self) -> Result<Vec<Address>> {
        let deployer = self.wallet.address();
        Ok(self
            .rpc
            .accounts()
            .await?
            .into_iter()
            .filter(|account| *account != deployer)
            .collect())
    }

    pub async fn deployer_balance(&self) -> Result<U256> {
        self.rpc.balance(self.wallet.address()).await
    }
}

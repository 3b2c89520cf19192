//! Per-network records of deployed contracts.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    json_abi::JsonAbi,
    primitives::{Address, B256},
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the file holding the chain ID of a network's deployments folder.
pub const CHAIN_ID_FILENAME: &str = ".chainId";

/// A deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub address: Address,
    pub abi: JsonAbi,
    /// Constructor arguments, rendered for humans.
    pub args: Vec<String>,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub deployed_at: DateTime<Utc>,
}

/// Deployments of one network.
///
/// Persistent networks keep records under `<root>/<network>/<Name>.json` so later
/// runs (front-end sync, interaction commands) can find contracts by name.
/// Ephemeral networks keep them in memory only.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: Option<PathBuf>,
    chain_id: u64,
    cache: BTreeMap<String, Deployment>,
}

impl DeploymentStore {
    /// A store persisted under `root/network_name`.
    pub fn persistent(root: &Path, network_name: &str, chain_id: u64) -> Self {
        Self {
            dir: Some(root.join(network_name)),
            chain_id,
            cache: BTreeMap::new(),
        }
    }

    /// A store that never touches the disk.
    pub fn ephemeral(chain_id: u64) -> Self {
        Self {
            dir: None,
            chain_id,
            cache: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Record a deployment.
    pub fn save(&mut self, name: &str, deployment: Deployment) -> anyhow::Result<()> {
        if let Some(dir) = &self.dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create deployments directory {}", dir.display()))?;

            let chain_id_path = dir.join(CHAIN_ID_FILENAME);
            std::fs::write(&chain_id_path, self.chain_id.to_string())
                .with_context(|| format!("Failed to write {}", chain_id_path.display()))?;

            let path = dir.join(format!("{}.json", name));
            let content = serde_json::to_string_pretty(&deployment)
                .context("Failed to serialize deployment")?;
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write deployment to {}", path.display()))?;

            tracing::debug!(name, path = %path.display(), "Deployment saved");
        }

        self.cache.insert(name.to_string(), deployment);
        Ok(())
    }

    /// Look up a deployment by contract name.
    pub fn get(&mut self, name: &str) -> anyhow::Result<Deployment> {
        if let Some(deployment) = self.cache.get(name) {
            return Ok(deployment.clone());
        }

        let Some(dir) = &self.dir else {
            anyhow::bail!("No deployment found for {}. Deploy it first.", name);
        };

        let path = dir.join(format!("{}.json", name));
        if !path.exists() {
            anyhow::bail!(
                "No deployment found for {} at {}. Deploy it first.",
                name,
                path.display()
            );
        }

        self.check_chain_id(dir)?;

        let deployment: Deployment = serde_json::from_str(
            &std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read deployment from {}", path.display()))?,
        )
        .with_context(|| format!("Failed to parse deployment {}", path.display()))?;

        self.cache.insert(name.to_string(), deployment.clone());
        Ok(deployment)
    }

    /// Refuse records written for another chain, e.g. after a node was reset with a new chain ID.
    fn check_chain_id(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(CHAIN_ID_FILENAME);
        if !path.exists() {
            return Ok(());
        }

        let recorded: u64 = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .trim()
            .parse()
            .with_context(|| format!("Invalid chain id in {}", path.display()))?;

        if recorded != self.chain_id {
            anyhow::bail!(
                "Deployments in {} belong to chain {}, but the node reports chain {}",
                dir.display(),
                recorded,
                self.chain_id
            );
        }
        Ok(())
    }
}

//! Keeps a front-end project's contract constants in sync with deployments.
//!
//! Two files are maintained: the ABI of the raffle, and a JSON object mapping
//! stringified chain IDs to every raffle address deployed on that chain.

use std::{collections::BTreeMap, path::Path};

use alloy_core::{json_abi::JsonAbi, primitives::Address};
use anyhow::Context;

/// Chain ID (as a string) → deployed addresses.
pub type ContractAddresses = BTreeMap<String, Vec<String>>;

/// Read the address file. A missing file reads as an empty mapping.
pub fn read_contract_addresses(path: &Path) -> anyhow::Result<ContractAddresses> {
    if !path.exists() {
        return Ok(ContractAddresses::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(ContractAddresses::new());
    }

    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Record `address` under `chain_id` unless it is already listed.
///
/// Returns whether the file content changed.
pub fn update_contract_addresses(
    path: &Path,
    chain_id: u64,
    address: Address,
) -> anyhow::Result<bool> {
    let mut addresses = read_contract_addresses(path)?;
    let address = address.to_checksum(None);

    let list = addresses.entry(chain_id.to_string()).or_default();
    let added = !list.iter().any(|known| known.eq_ignore_ascii_case(&address));
    if added {
        list.push(address);
    }

    write(path, &serde_json::to_string(&addresses)?)?;
    tracing::debug!(path = %path.display(), chain_id, added, "Contract addresses updated");

    Ok(added)
}

/// Overwrite the ABI file.
pub fn update_abi(path: &Path, abi: &JsonAbi) -> anyhow::Result<()> {
    let content = serde_json::to_string(abi).context("Failed to serialize ABI")?;
    write(path, &content)?;
    tracing::debug!(path = %path.display(), "ABI updated");
    Ok(())
}

fn write(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

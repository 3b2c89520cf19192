//! Compiled contract artifacts.
//!
//! Artifacts are produced by an external Solidity toolchain. Both Hardhat
//! (`bytecode` is a hex string) and Foundry (`bytecode.object`) layouts are read.

use std::path::{Path, PathBuf};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::Context;
use serde::Deserialize;

/// Directory holding Hardhat build info files, skipped when searching artifacts.
const BUILD_INFO_DIR: &str = "build-info";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    #[serde(default)]
    source_name: Option<String>,
    abi: JsonAbi,
    bytecode: RawBytecode,
}

/// A compiled contract ready to be deployed.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub contract_name: String,
    /// Source path relative to the project root, e.g. `contracts/Raffle.sol`.
    pub source_name: Option<String>,
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl Artifact {
    /// Fully qualified name as block explorers expect it: `contracts/Raffle.sol:Raffle`.
    pub fn fully_qualified_name(&self) -> String {
        match &self.source_name {
            Some(source) => format!("{}:{}", source, self.contract_name),
            None => self.contract_name.clone(),
        }
    }

    /// Init code for a deployment: creation bytecode followed by encoded constructor arguments.
    pub fn init_code(&self, encoded_args: &[u8]) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(encoded_args);
        code.into()
    }
}

/// Compiler input and version of a Hardhat build.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Full compiler version, e.g. `0.8.7+commit.e28d00a7`.
    pub solc_long_version: String,
    /// The standard JSON input given to solc.
    pub input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Looks up artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the artifact of a contract by name.
    pub fn load(&self, contract_name: &str) -> anyhow::Result<Artifact> {
        let path = self.find(contract_name)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let raw: RawArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let bytecode = match raw.bytecode {
            RawBytecode::Hex(code) | RawBytecode::Object { object: code } => code,
        };

        if bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        tracing::debug!(contract = contract_name, path = %path.display(), "Artifact loaded");

        Ok(Artifact {
            contract_name: raw.contract_name.unwrap_or_else(|| contract_name.to_string()),
            source_name: raw.source_name,
            abi: raw.abi,
            bytecode,
        })
    }

    /// Resolve the build info of a contract through its Hardhat debug file.
    pub fn build_info(&self, contract_name: &str) -> anyhow::Result<BuildInfo> {
        let artifact_path = self.find(contract_name)?;
        let dbg_path = artifact_path.with_file_name(format!("{}.dbg.json", contract_name));

        let dbg: DebugFile = serde_json::from_str(
            &std::fs::read_to_string(&dbg_path)
                .with_context(|| format!("Failed to read debug file {}", dbg_path.display()))?,
        )
        .with_context(|| format!("Failed to parse debug file {}", dbg_path.display()))?;

        let parent = dbg_path
            .parent()
            .context("Debug file path must have a parent directory")?;
        let build_info_path = parent.join(&dbg.build_info);

        serde_json::from_str(
            &std::fs::read_to_string(&build_info_path).with_context(|| {
                format!("Failed to read build info {}", build_info_path.display())
            })?,
        )
        .with_context(|| format!("Failed to parse build info {}", build_info_path.display()))
    }

    /// Find `<name>.json` anywhere under the root.
    fn find(&self, contract_name: &str) -> anyhow::Result<PathBuf> {
        let file_name = format!("{}.json", contract_name);
        let mut matches = Vec::new();
        Self::collect(&self.root, &file_name, &mut matches)
            .with_context(|| format!("Failed to search artifacts in {}", self.root.display()))?;

        match matches.len() {
            0 => anyhow::bail!(
                "No artifact found for {} in {}. Compile the contracts first.",
                contract_name,
                self.root.display()
            ),
            1 => Ok(matches.remove(0)),
            _ => anyhow::bail!(
                "Multiple artifacts found for {}: {:?}",
                contract_name,
                matches
            ),
        }
    }

    fn collect(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if path.file_name().is_some_and(|n| n == BUILD_INFO_DIR) {
                    continue;
                }
                Self::collect(&path, file_name, matches)?;
            } else if path.file_name().is_some_and(|n| n == file_name) {
                matches.push(path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const ABI: &str = r#"[{"type":"function","name":"getEntranceFee","inputs":[],"outputs":[{"name":"","type":"uint256","internalType":"uint256"}],"stateMutability":"view"}]"#;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_hardhat_artifact() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write(
            &dir.path().join("contracts/Raffle.sol/Raffle.json"),
            &format!(
                r#"{{"_format":"hh-sol-artifact-1","contractName":"Raffle","sourceName":"contracts/Raffle.sol","abi":{},"bytecode":"0x6080604052","deployedBytecode":"0x"}}"#,
                ABI
            ),
        );

        let artifact = ArtifactStore::new(dir.path()).load("Raffle").unwrap();

        assert_eq!(artifact.contract_name, "Raffle");
        assert_eq!(artifact.fully_qualified_name(), "contracts/Raffle.sol:Raffle");
        assert_eq!(artifact.bytecode.len(), 5);
        assert_eq!(artifact.abi.functions().count(), 1);
        assert_eq!(
            artifact.init_code(&[0xaa, 0xbb]).to_vec(),
            vec![0x60, 0x80, 0x60, 0x40, 0x52, 0xaa, 0xbb]
        );
    }

    #[test]
    fn test_load_foundry_artifact() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write(
            &dir.path().join("VRFCoordinatorV2Mock.sol/VRFCoordinatorV2Mock.json"),
            &format!(
                r#"{{"abi":{},"bytecode":{{"object":"0x6080","linkReferences":{{}}}}}}"#,
                ABI
            ),
        );

        let artifact = ArtifactStore::new(dir.path())
            .load("VRFCoordinatorV2Mock")
            .unwrap();

        assert_eq!(artifact.contract_name, "VRFCoordinatorV2Mock");
        assert_eq!(artifact.fully_qualified_name(), "VRFCoordinatorV2Mock");
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80]);
    }

    #[test]
    fn test_missing_and_ambiguous_artifacts() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.load("Raffle").is_err());

        let artifact = format!(r#"{{"abi":{},"bytecode":"0x60"}}"#, ABI);
        write(&dir.path().join("a/Raffle.json"), &artifact);
        write(&dir.path().join("b/Raffle.json"), &artifact);

        let err = store.load("Raffle").unwrap_err();
        assert!(err.to_string().contains("Multiple artifacts"));
    }

    #[test]
    fn test_interface_without_bytecode_is_rejected() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write(
            &dir.path().join("IRaffle.json"),
            &format!(r#"{{"abi":{},"bytecode":"0x"}}"#, ABI),
        );

        assert!(ArtifactStore::new(dir.path()).load("IRaffle").is_err());
    }

    #[test]
    fn test_build_info_through_debug_file() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write(
            &dir.path().join("contracts/Raffle.sol/Raffle.json"),
            &format!(r#"{{"contractName":"Raffle","abi":{},"bytecode":"0x60"}}"#, ABI),
        );
        write(
            &dir.path().join("contracts/Raffle.sol/Raffle.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../build-info/abc123.json"}"#,
        );
        // A file with the same name inside build-info must not be picked up as an artifact.
        write(
            &dir.path().join("build-info/abc123.json"),
            r#"{"solcVersion":"0.8.7","solcLongVersion":"0.8.7+commit.e28d00a7","input":{"language":"Solidity","sources":{}}}"#,
        );

        let build_info = ArtifactStore::new(dir.path()).build_info("Raffle").unwrap();

        assert_eq!(build_info.solc_long_version, "0.8.7+commit.e28d00a7");
        assert_eq!(build_info.input["language"], "Solidity");
    }
}

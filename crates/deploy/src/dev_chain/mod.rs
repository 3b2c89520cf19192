//! Ephemeral development chain backing the `hardhat` network.
//!
//! An Anvil container is started for the duration of one invocation and
//! removed when the [`DevChain`] is dropped.

mod cmd;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

pub use cmd::AnvilCmdBuilder;

use crate::{
    docker::{DevDocker, DockerImage, PortMapping, ServiceConfig},
    network::LOCAL_CHAIN_ID,
    rpc::RpcClient,
};

/// Default Docker image for Anvil (Foundry).
pub const DEFAULT_DOCKER_IMAGE: &str = "ghcr.io/foundry-rs/foundry";
/// Default Docker tag for Anvil (Foundry).
pub const DEFAULT_DOCKER_TAG: &str = "latest";

/// The port Anvil listens on inside the container.
pub const ANVIL_INTERNAL_PORT: u16 = 8545;

/// Configuration of the ephemeral dev chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevChainConfig {
    pub docker_image: DockerImage,
    /// Prefix of the container name. The process ID is appended.
    pub container_name: String,
    /// Host port to publish the RPC on. A free port is picked when unset.
    pub host_port: Option<u16>,
    /// Interval mining, in seconds. Unset means automine.
    pub block_time: Option<u64>,
    /// Number of funded dev accounts.
    pub accounts: u32,
    /// Seconds to wait for the RPC to answer after the container started.
    pub startup_timeout_secs: u64,
    /// Leave the container running on exit.
    pub no_cleanup: bool,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        Self {
            docker_image: DockerImage::new(DEFAULT_DOCKER_IMAGE, DEFAULT_DOCKER_TAG),
            container_name: "raffle-anvil".to_string(),
            host_port: None,
            block_time: None,
            accounts: 10,
            startup_timeout_secs: 60,
            no_cleanup: false,
        }
    }
}

impl DevChainConfig {
    fn cmd(&self) -> Vec<String> {
        AnvilCmdBuilder::new(LOCAL_CHAIN_ID)
            .host("0.0.0.0")
            .port(ANVIL_INTERNAL_PORT)
            .block_time(self.block_time)
            .accounts(self.accounts)
            .build()
    }

    /// Start Anvil and wait until its RPC answers.
    pub async fn start(&self) -> anyhow::Result<DevChain> {
        let mut docker = DevDocker::connect(self.no_cleanup)?;
        let container_name = format!("{}-{}", self.container_name, std::process::id());

        let service_config = ServiceConfig::new(self.docker_image.clone())
            .entrypoint(vec!["anvil".to_string()])
            .cmd(self.cmd())
            .port(PortMapping::tcp(ANVIL_INTERNAL_PORT, self.host_port));

        let service = docker
            .start_service(&container_name, service_config)
            .await
            .context("Failed to start Anvil container")?;

        docker.stream_logs(&service.container_id);

        let host_port = service
            .host_ports
            .get(&ANVIL_INTERNAL_PORT)
            .copied()
            .context("Anvil RPC port was not published")?;
        let url = Url::parse(&format!("http://127.0.0.1:{}/", host_port))
            .context("Failed to parse dev chain URL")?;

        let rpc = RpcClient::new(url.as_str())?;
        rpc.wait_until_ready(self.startup_timeout_secs)
            .await
            .context("Anvil did not become ready")?;

        tracing::info!(
            container_id = %service.container_id,
            container_name = %service.container_name,
            %url,
            "Dev chain started"
        );

        Ok(DevChain {
            _docker: docker,
            container_name: service.container_name,
            url,
        })
    }
}

/// A running dev chain. Dropping it removes the container.
pub struct DevChain {
    _docker: DevDocker,
    pub container_name: String,
    pub url: Url,
}

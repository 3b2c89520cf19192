//! Docker client for the dev chain container.

use std::{collections::HashMap, collections::HashSet, mem, time::Duration};

use anyhow::{Context, Result};
use bollard::{
    Docker,
    container::{
        Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StopContainerOptions,
    },
    image::CreateImageOptions,
    secret::{HostConfig, PortBinding},
};
use derive_more::{Deref, Display};
use futures::{StreamExt, executor::block_on, future::join_all};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::timeout};

/// Timeout for cleaning up containers on drop.
const DOCKER_DROP_TIMEOUT: Duration = Duration::from_secs(60);

/// A TCP port published from a container to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    /// The port on the host, or `None` to let Docker pick a free one.
    pub host_port: Option<u16>,
}

impl PortMapping {
    pub fn tcp(container_port: u16, host_port: Option<u16>) -> Self {
        Self {
            container_port,
            host_port,
        }
    }

    fn key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

/// Configuration for starting a container.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub image: DockerImage,
    pub entrypoint: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub port_mappings: Vec<PortMapping>,
}

impl ServiceConfig {
    pub fn new(image: DockerImage) -> Self {
        Self {
            image,
            entrypoint: None,
            cmd: None,
            port_mappings: Vec::new(),
        }
    }

    pub fn entrypoint(mut self, entrypoint: Vec<String>) -> Self {
        self.entrypoint = Some(entrypoint);
        self
    }

    pub fn cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = Some(cmd);
        self
    }

    pub fn port(mut self, mapping: PortMapping) -> Self {
        self.port_mappings.push(mapping);
        self
    }
}

/// A started container and the host ports its ports were published on.
#[derive(Debug, Clone)]
pub struct ServiceHandler {
    pub container_id: String,
    pub container_name: String,
    /// Container port → host port.
    pub host_ports: HashMap<u16, u16>,
}

/// A Docker image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{image}:{tag}")]
pub struct DockerImage {
    /// The image name (e.g., "ghcr.io/foundry-rs/foundry").
    pub image: String,
    /// The image tag (e.g., "latest" or "v1.0.0").
    pub tag: String,
}

impl DockerImage {
    pub fn new(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
        }
    }
}

/// Docker client that removes the containers it started when dropped.
#[derive(Deref)]
pub struct DevDocker {
    #[deref]
    docker: Docker,

    /// Containers that have been started.
    containers: HashSet<String>,

    /// Keep containers alive after exit.
    no_cleanup: bool,
}

impl Drop for DevDocker {
    fn drop(&mut self) {
        if self.no_cleanup {
            tracing::debug!("Cleanup of docker containers on exit is disabled. Exiting.");
            return;
        }

        if self.containers.is_empty() {
            return;
        }

        tracing::debug!("Cleaning up {} container(s)...", self.containers.len());

        let docker = self.docker.clone();
        let containers = mem::take(&mut self.containers);

        let cleanup = async {
            let results = containers
                .into_iter()
                .map(async |container_id| Self::stop_and_remove(&docker, &container_id).await)
                .collect::<Vec<_>>();

            timeout(DOCKER_DROP_TIMEOUT, join_all(results))
                .await?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;

            Ok::<_, anyhow::Error>(())
        };

        if let Err(e) = block_on(cleanup) {
            tracing::error!(error = ?e, "Failed to cleanup containers");
            return;
        }

        tracing::info!("✓ Dev chain container removed");
    }
}

impl DevDocker {
    const STOP_CONTAINER_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to the local Docker daemon.
    pub fn connect(no_cleanup: bool) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker. Is Docker running?")?;

        Ok(Self {
            docker,
            containers: HashSet::new(),
            no_cleanup,
        })
    }

    /// Pull an image unless it is already available locally.
    pub async fn pull_image(&self, image: &DockerImage) -> Result<()> {
        let full_image = image.to_string();

        if self.docker.inspect_image(&full_image).await.is_ok() {
            tracing::debug!(image = %full_image, "Image already available locally, skipping pull");
            return Ok(());
        }

        tracing::info!(image = %full_image, "Pulling image...");

        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.image.clone(),
                tag: image.tag.clone(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await
            && let Some(status) = result
                .with_context(|| format!("Failed to pull image '{}'", full_image))?
                .status
        {
            tracing::trace!(status, "Image pull");
        }

        Ok(())
    }

    /// Forward a container's output to the `debug` log.
    pub fn stream_logs(&self, container_id: &str) -> JoinHandle<()> {
        let logs_options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        };

        let mut log_stream = self.logs(container_id, Some(logs_options));
        let container_id = container_id.to_string();

        tokio::spawn(async move {
            while let Some(log_result) = log_stream.next().await {
                match log_result {
                    Ok(log) => tracing::debug!(container_id, %log),
                    Err(e) => {
                        tracing::debug!(container_id, error = %e, "Log stream closed");
                        break;
                    }
                }
            }
        })
    }

    /// Create and start a container, then look up the host ports it was published on.
    pub async fn start_service(
        &mut self,
        container_name: &str,
        config: ServiceConfig,
    ) -> Result<ServiceHandler> {
        self.pull_image(&config.image).await?;

        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = config
            .port_mappings
            .iter()
            .map(|pm| {
                (
                    pm.key(),
                    Some(vec![PortBinding {
                        host_ip: Some("127.0.0.1".to_string()),
                        host_port: pm.host_port.map(|port| port.to_string()),
                    }]),
                )
            })
            .collect();

        let exposed_ports = config
            .port_mappings
            .iter()
            .map(|pm| (pm.key(), HashMap::new()))
            .collect();

        let container_config = Config {
            image: Some(config.image.to_string()),
            entrypoint: config.entrypoint,
            cmd: config.cmd,
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        tracing::trace!(container_name, "Creating container");
        let container_id = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name,
                    ..Default::default()
                }),
                container_config,
            )
            .await
            .with_context(|| format!("Failed to create container {}", container_name))?
            .id;

        // Track before starting so a failed start is still cleaned up.
        self.containers.insert(container_id.clone());

        self.docker
            .start_container::<String>(&container_id, None)
            .await
            .with_context(|| format!("Failed to start container {}", container_name))?;

        let host_ports = self
            .published_ports(&container_id, &config.port_mappings)
            .await?;

        Ok(ServiceHandler {
            container_id,
            container_name: container_name.to_string(),
            host_ports,
        })
    }

    /// Host ports Docker bound for the given mappings.
    async fn published_ports(
        &self,
        container_id: &str,
        mappings: &[PortMapping],
    ) -> Result<HashMap<u16, u16>> {
        let info = self
            .docker
            .inspect_container(container_id, None)
            .await
            .context("Failed to inspect container")?;

        let ports = info
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();

        mappings
            .iter()
            .map(|pm| {
                let host_port = ports
                    .get(&pm.key())
                    .and_then(|bindings| bindings.as_ref())
                    .and_then(|bindings| bindings.iter().find_map(|b| b.host_port.as_deref()))
                    .with_context(|| format!("Port {} is not published", pm.key()))?
                    .parse::<u16>()
                    .context("Invalid host port")?;
                Ok((pm.container_port, host_port))
            })
            .collect()
    }

    async fn stop_and_remove(docker: &Docker, container_id: &str) -> Result<()> {
        tracing::trace!(container_id, "Stopping and removing container");

        // Errors are ignored: the container may already be stopped or gone.
        docker
            .stop_container(
                container_id,
                Some(StopContainerOptions {
                    t: Self::STOP_CONTAINER_TIMEOUT.as_secs() as i64,
                }),
            )
            .await
            .ok();

        docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .ok();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_image_display() {
        let image = DockerImage::new("ghcr.io/foundry-rs/foundry", "latest");
        assert_eq!(image.to_string(), "ghcr.io/foundry-rs/foundry:latest");
    }

    #[test]
    fn test_port_mapping_key() {
        assert_eq!(PortMapping::tcp(8545, None).key(), "8545/tcp");
    }
}

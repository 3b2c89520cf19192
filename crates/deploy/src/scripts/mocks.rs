//! `00-deploy-mocks`: the VRF coordinator mock, on development chains only.

use anyhow::Result;

use crate::{
    contracts::{BASE_FEE, GAS_PRICE_LINK, VRF_COORDINATOR_V2_MOCK, VrfCoordinatorMock},
    session::{DeployRequest, Session},
};

pub(super) async fn deploy_mocks(session: &mut Session) -> Result<()> {
    if !session.network.is_development() {
        tracing::debug!(network = %session.network.name, "Live network, no mocks needed");
        return Ok(());
    }

    tracing::info!("Local network detected! Deploying mocks...");

    session
        .deploy(DeployRequest {
            contract_name: VRF_COORDINATOR_V2_MOCK,
            encoded_args: VrfCoordinatorMock::constructor_args(),
            display_args: vec![BASE_FEE.to_string(), GAS_PRICE_LINK.to_string()],
            confirmations: 1,
        })
        .await?;

    tracing::info!("Mocks deployed!");
    Ok(())
}

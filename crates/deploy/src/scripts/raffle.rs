//! `01-deploy-raffle`: the raffle itself, wired to a real or mocked VRF coordinator.

use alloy_core::primitives::{Address, B256, U256};
use alloy_sol_types::SolConstructor;
use anyhow::{Context, Result};

use crate::{
    contracts::{RAFFLE, Raffle, VRF_COORDINATOR_V2_MOCK, VRF_SUB_FUND_AMOUNT, VrfCoordinatorMock},
    network::{Network, NetworkConfigItem},
    session::{DeployRequest, Session},
    verify::{EtherscanVerifier, VerificationRequest},
};

/// A subscription created on the local mock coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSubscription {
    pub coordinator: Address,
    pub subscription_id: u64,
}

/// Constructor arguments of the raffle, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaffleArgs {
    pub vrf_coordinator_v2: Address,
    pub entrance_fee: U256,
    pub gas_lane: B256,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub interval: U256,
}

impl RaffleArgs {
    /// Resolve the constructor arguments for a network.
    ///
    /// Development networks take the coordinator and subscription from the
    /// mock; live networks take them from the chain table.
    pub fn resolve(
        network: &Network,
        item: &NetworkConfigItem,
        mock: Option<MockSubscription>,
    ) -> Result<Self> {
        let (vrf_coordinator_v2, subscription_id) = match (network.is_development(), mock) {
            (true, Some(mock)) => (mock.coordinator, mock.subscription_id),
            (true, None) => anyhow::bail!(
                "Network {} is a development network and needs the VRF coordinator mock",
                network.name
            ),
            (false, _) => (
                item.vrf_coordinator_v2.with_context(|| {
                    format!("No VRF coordinator configured for chain id {}", item.chain_id)
                })?,
                item.subscription_id.with_context(|| {
                    format!("No VRF subscription configured for chain id {}", item.chain_id)
                })?,
            ),
        };

        Ok(Self {
            vrf_coordinator_v2,
            entrance_fee: item.raffle_entrance_fee,
            gas_lane: item.gas_lane,
            subscription_id,
            callback_gas_limit: item.callback_gas_limit,
            interval: U256::from(item.keepers_update_interval),
        })
    }

    pub fn abi_encode(&self) -> Vec<u8> {
        Raffle::constructorCall {
            vrfCoordinatorV2: self.vrf_coordinator_v2,
            entranceFee: self.entrance_fee,
            gasLane: self.gas_lane,
            subscriptionId: self.subscription_id,
            callbackGasLimit: self.callback_gas_limit,
            interval: self.interval,
        }
        .abi_encode()
    }

    /// Arguments as strings, for deployment records.
    pub fn to_strings(&self) -> Vec<String> {
        vec![
            self.vrf_coordinator_v2.to_string(),
            self.entrance_fee.to_string(),
            self.gas_lane.to_string(),
            self.subscription_id.to_string(),
            self.callback_gas_limit.to_string(),
            self.interval.to_string(),
        ]
    }
}

/// Create and fund a subscription on the mock coordinator.
async fn setup_mock_subscription(session: &mut Session) -> Result<(VrfCoordinatorMock, MockSubscription)> {
    let address = session
        .contract_address(VRF_COORDINATOR_V2_MOCK)
        .context("The VRF coordinator mock must be deployed first (tag `mocks`)")?;
    let mock = VrfCoordinatorMock::new(address, session.rpc.clone());

    let subscription_id = mock.create_subscription(&session.wallet).await?;
    mock.fund_subscription(&session.wallet, subscription_id, VRF_SUB_FUND_AMOUNT)
        .await?;

    tracing::info!(subscription_id, amount = %VRF_SUB_FUND_AMOUNT, "Mock subscription created and funded");

    Ok((
        mock,
        MockSubscription {
            coordinator: address,
            subscription_id,
        },
    ))
}

pub(super) async fn deploy_raffle(session: &mut Session) -> Result<()> {
    let development = session.network.is_development();

    let mock = if development {
        Some(setup_mock_subscription(session).await?)
    } else {
        None
    };

    let args = RaffleArgs::resolve(
        &session.network,
        session.chain_params()?,
        mock.as_ref().map(|(_, subscription)| *subscription),
    )?;
    let encoded_args = args.abi_encode();
    let confirmations = session.network.wait_confirmations();

    let raffle = session
        .deploy(DeployRequest {
            contract_name: RAFFLE,
            encoded_args: encoded_args.clone(),
            display_args: args.to_strings(),
            confirmations,
        })
        .await?;

    if let Some((mock, subscription)) = mock {
        mock.add_consumer(&session.wallet, subscription.subscription_id, raffle.address)
            .await?;
        tracing::info!(consumer = %raffle.address, "Raffle added as VRF consumer");
    }

    if !development && let Some(api_key) = session.env.etherscan_api_key.clone() {
        tracing::info!("Verifying...");
        if let Err(e) = verify(session, &api_key, raffle.address, encoded_args).await {
            tracing::warn!(error = %e, "Verification skipped");
        }
    }

    Ok(())
}

async fn verify(session: &Session, api_key: &str, address: Address, constructor_args: Vec<u8>) -> Result<()> {
    let artifact = session.artifacts.load(RAFFLE)?;
    let build_info = session.artifacts.build_info(RAFFLE)?;

    let verifier = EtherscanVerifier::new(session.config.etherscan.clone(), api_key, session.chain_id())?;
    verifier
        .verify_or_warn(&VerificationRequest {
            address,
            contract_name: artifact.fully_qualified_name(),
            build_info,
            constructor_args,
        })
        .await;
    Ok(())
}

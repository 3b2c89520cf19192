//! Helper commands acting on a deployed raffle.

use alloy_core::primitives::{Address, Bytes, U256, keccak256};
use anyhow::{Context, Result};

use crate::{
    contracts::{RAFFLE, RaffleContract, RaffleState, VRF_COORDINATOR_V2_MOCK, VrfCoordinatorMock},
    network::LOCAL_CHAIN_ID,
    scripts::{DeployTag, run_scripts},
    session::Session,
};

/// A snapshot of the raffle's public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaffleStatus {
    pub address: Address,
    pub entrance_fee: U256,
    pub state: RaffleState,
    pub interval: U256,
    pub number_of_players: U256,
    pub latest_timestamp: U256,
    pub recent_winner: Address,
}

/// What `mock_offchain` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpkeepOutcome {
    NotNeeded,
    /// Upkeep performed. The winner is known when the request was fulfilled locally.
    Performed {
        request_id: U256,
        winner: Option<Address>,
    },
}

/// The raffle of the session's network.
///
/// On an ephemeral dev chain nothing is deployed yet, so every script runs first.
pub async fn raffle(session: &mut Session) -> Result<RaffleContract> {
    if session.is_ephemeral() && session.contract_address(RAFFLE).is_err() {
        tracing::info!("Ephemeral network, deploying first");
        run_scripts(session, &[DeployTag::All]).await?;
    }

    let address = session.contract_address(RAFFLE)?;
    Ok(RaffleContract::new(address, session.rpc.clone()))
}

/// Enter the raffle from the deployer account, paying one wei above the entrance fee.
pub async fn enter_raffle(session: &mut Session) -> Result<U256> {
    let raffle = raffle(session).await?;

    let value = raffle.entrance_fee().await? + U256::from(1);
    raffle
        .enter_raffle(&session.wallet, value)
        .await?
        .wait(1)
        .await
        .context("Failed to enter the raffle")?;

    tracing::info!(player = %session.wallet.address(), %value, "Entered!");
    Ok(value)
}

/// Play the off-chain services: trigger the upkeep if due and, on a local chain,
/// answer the randomness request through the mock coordinator.
pub async fn mock_offchain(session: &mut Session) -> Result<UpkeepOutcome> {
    let raffle = raffle(session).await?;

    let check_data = Bytes::from(keccak256(b"").to_vec());
    let (upkeep_needed, _) = raffle.check_upkeep(check_data.clone()).await?;

    if !upkeep_needed {
        tracing::info!("No upkeep needed");
        return Ok(UpkeepOutcome::NotNeeded);
    }

    let receipt = raffle
        .perform_upkeep(&session.wallet, check_data)
        .await?
        .wait(1)
        .await?;
    let request_id = raffle.request_id(&receipt)?;
    tracing::info!(%request_id, "Performed upkeep");

    if session.chain_id() != LOCAL_CHAIN_ID {
        return Ok(UpkeepOutcome::Performed {
            request_id,
            winner: None,
        });
    }

    let coordinator = VrfCoordinatorMock::new(
        session.contract_address(VRF_COORDINATOR_V2_MOCK)?,
        session.rpc.clone(),
    );
    coordinator
        .fulfill_random_words(&session.wallet, request_id, raffle.address)
        .await?;
    tracing::info!("Responded!");

    let winner = raffle.recent_winner().await?;
    tracing::info!(%winner, "The winner is");

    Ok(UpkeepOutcome::Performed {
        request_id,
        winner: Some(winner),
    })
}

/// Move a development chain's clock past the raffle interval and mine a block.
pub async fn advance_past_interval(session: &mut Session) -> Result<u64> {
    if !session.network.is_development() {
        anyhow::bail!(
            "Cannot move the clock of live network {}",
            session.network.name
        );
    }

    let raffle = raffle(session).await?;
    let seconds = raffle.interval().await?.saturating_to::<u64>() + 1;

    session.rpc.increase_time(seconds).await?;
    session.rpc.mine().await?;

    tracing::info!(seconds, "Advanced dev chain time");
    Ok(seconds)
}

/// Read the raffle's public state.
pub async fn raffle_status(session: &mut Session) -> Result<RaffleStatus> {
    let raffle = raffle(session).await?;

    Ok(RaffleStatus {
        address: raffle.address,
        entrance_fee: raffle.entrance_fee().await?,
        state: raffle.raffle_state().await?,
        interval: raffle.interval().await?,
        number_of_players: raffle.number_of_players().await?,
        latest_timestamp: raffle.latest_timestamp().await?,
        recent_winner: raffle.recent_winner().await?,
    })
}

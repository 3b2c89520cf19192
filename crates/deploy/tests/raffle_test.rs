//! Integration tests for raffle-deploy.
//!
//! These tests require Docker to be running and the contracts to be compiled.
//! Each test starts its own throwaway Anvil container and deploys everything from scratch.
//! The artifacts directory is read from `RAFFLE_TEST_ARTIFACTS` (default: `artifacts`).
//! Run with: cargo test --test raffle_test -- --ignored
//!
//! `test_live_keepers_and_vrf_pick_a_winner` runs against sepolia instead. It needs the
//! deployed raffle, a funded `PRIVATE_KEY` and a registered upkeep.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::{Context, Result};
use raffle_deploy::{
    DeployTag, RAFFLE_CONF_FILENAME, RaffleConfig, RaffleContract, RaffleState, Session,
    VrfCoordinatorMock, Wallet,
    contracts::{RAFFLE, Raffle, VRF_COORDINATOR_V2_MOCK},
    events::wait_for_event,
    interact::{self, UpkeepOutcome},
    network::LOCAL_CHAIN_ID,
    run_scripts,
};
use rand::Rng;

const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Live Keepers and VRF can take several blocks each to answer.
const LIVE_EVENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Test setup context: a fresh dev chain with every script deployed.
struct TestContext {
    session: Session,
    raffle: RaffleContract,
    coordinator: VrfCoordinatorMock,
    entrance_fee: U256,
    interval: u64,
}

impl TestContext {
    async fn new() -> Result<Self> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let mut config = RaffleConfig::default();
        config.artifacts = std::env::var("RAFFLE_TEST_ARTIFACTS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("artifacts"));
        // Tests run in parallel within one process.
        config.dev_chain.container_name =
            format!("raffle-test-{}", rand::rng().random_range(100000..=999999));

        let mut session = Session::connect(config, "hardhat").await?;
        run_scripts(&mut session, &[DeployTag::All]).await?;

        let raffle = RaffleContract::new(session.contract_address(RAFFLE)?, session.rpc.clone());
        let coordinator = VrfCoordinatorMock::new(
            session.contract_address(VRF_COORDINATOR_V2_MOCK)?,
            session.rpc.clone(),
        );
        let entrance_fee = raffle.entrance_fee().await?;
        let interval = raffle.interval().await?.saturating_to();

        Ok(Self {
            session,
            raffle,
            coordinator,
            entrance_fee,
            interval,
        })
    }

    async fn enter(&self) -> Result<()> {
        self.enter_as(&self.session.wallet).await
    }

    async fn enter_as(&self, wallet: &Wallet) -> Result<()> {
        self.raffle
            .enter_raffle(wallet, self.entrance_fee)
            .await?
            .wait(1)
            .await?;
        Ok(())
    }

    async fn skip_interval(&self) -> Result<()> {
        self.session.rpc.increase_time(self.interval + 1).await?;
        self.session.rpc.mine().await
    }

    /// Hex selector of the raffle error whose name ends with `suffix`, read from the compiled ABI.
    fn error_selector(&self, suffix: &str) -> Result<String> {
        let abi = self.session.artifacts.load(RAFFLE)?.abi;
        let error = abi
            .errors
            .iter()
            .find(|(name, _)| name.ends_with(suffix))
            .and_then(|(_, overloads)| overloads.first())
            .with_context(|| format!("No error ending with {} in the raffle ABI", suffix))?;
        Ok(hex::encode(error.selector()))
    }
}

/// Assert that the node rejected a transaction as a revert mentioning `reason`.
fn assert_reverted_with<T: std::fmt::Debug>(result: Result<T>, reason: &str) {
    let err = result.expect_err("transaction should revert");
    let message = format!("{:#}", err);

    assert!(message.contains("revert"), "not a revert: {}", message);
    assert!(
        message.to_lowercase().contains(&reason.to_lowercase()),
        "expected a revert with {}, got: {}",
        reason,
        message
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_raffle_is_initialized_from_the_chain_table() -> Result<()> {
    let ctx = TestContext::new().await?;
    let params = ctx.session.chain_params()?;

    assert_eq!(ctx.raffle.raffle_state().await?, RaffleState::Open);
    assert_eq!(ctx.interval, params.keepers_update_interval);
    assert_eq!(ctx.entrance_fee, params.raffle_entrance_fee);
    assert_eq!(ctx.session.chain_id(), LOCAL_CHAIN_ID);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_enter_raffle() -> Result<()> {
    let ctx = TestContext::new().await?;

    assert_reverted_with(
        ctx.raffle.enter_raffle(&ctx.session.wallet, U256::ZERO).await,
        &ctx.error_selector("NotEnoughETHEntered")?,
    );

    let from_block = ctx.session.rpc.block_number().await?;
    ctx.enter().await?;

    assert_eq!(ctx.raffle.player(0).await?, ctx.session.wallet.address());
    let entered: Raffle::RaffleEnter =
        wait_for_event(&ctx.session.rpc, ctx.raffle.address, from_block, EVENT_TIMEOUT).await?;
    assert_eq!(entered.player, ctx.session.wallet.address());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_check_upkeep() -> Result<()> {
    let ctx = TestContext::new().await?;

    // Nobody entered yet.
    ctx.skip_interval().await?;
    let (upkeep_needed, _) = ctx.raffle.check_upkeep(Bytes::new()).await?;
    assert!(!upkeep_needed);

    ctx.enter().await?;
    ctx.skip_interval().await?;
    let (upkeep_needed, _) = ctx.raffle.check_upkeep(Bytes::new()).await?;
    assert!(upkeep_needed);

    // No upkeep while the raffle waits for its random number.
    ctx.raffle
        .perform_upkeep(&ctx.session.wallet, Bytes::new())
        .await?
        .wait(1)
        .await?;
    let (upkeep_needed, _) = ctx.raffle.check_upkeep(Bytes::new()).await?;
    assert_eq!(ctx.raffle.raffle_state().await?, RaffleState::Calculating);
    assert!(!upkeep_needed);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_perform_upkeep_requests_a_winner() -> Result<()> {
    let ctx = TestContext::new().await?;

    assert_reverted_with(
        ctx.raffle
            .perform_upkeep(&ctx.session.wallet, Bytes::new())
            .await,
        &ctx.error_selector("UpkeepNotNeeded")?,
    );

    ctx.enter().await?;
    ctx.skip_interval().await?;

    let receipt = ctx
        .raffle
        .perform_upkeep(&ctx.session.wallet, Bytes::new())
        .await?
        .wait(1)
        .await?;
    let request_id = ctx.raffle.request_id(&receipt)?;

    assert!(request_id > U256::ZERO);
    assert_eq!(ctx.raffle.raffle_state().await?, RaffleState::Calculating);

    assert_reverted_with(
        ctx.raffle
            .enter_raffle(&ctx.session.wallet, ctx.entrance_fee)
            .await,
        &ctx.error_selector("NotOpen")?,
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_fulfill_needs_a_pending_request() -> Result<()> {
    let ctx = TestContext::new().await?;
    ctx.enter().await?;
    ctx.skip_interval().await?;

    for request_id in [0u64, 1] {
        assert_reverted_with(
            ctx.coordinator
                .fulfill_random_words(&ctx.session.wallet, U256::from(request_id), ctx.raffle.address)
                .await,
            "nonexistent request",
        );
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_fulfill_picks_a_winner_resets_and_pays() -> Result<()> {
    let ctx = TestContext::new().await?;
    let players = ctx.session.players().await?;
    anyhow::ensure!(players.len() >= 4, "Dev chain needs at least 5 accounts");

    // The deployer and three more accounts enter. A fourth account plays the
    // Keepers and VRF services so that no entrant pays gas past this point.
    let additional_entrants = &players[..3];
    let keeper = Wallet::Unlocked(players[3]);

    ctx.enter().await?;
    for player in additional_entrants {
        ctx.enter_as(&Wallet::Unlocked(*player)).await?;
    }
    ctx.skip_interval().await?;

    let entrants: Vec<Address> = std::iter::once(ctx.session.wallet.address())
        .chain(additional_entrants.iter().copied())
        .collect();
    let mut starting_balances = Vec::with_capacity(entrants.len());
    for entrant in &entrants {
        starting_balances.push(ctx.session.rpc.balance(*entrant).await?);
    }
    let start_timestamp = ctx.raffle.latest_timestamp().await?;
    let from_block = ctx.session.rpc.block_number().await?;

    let receipt = ctx
        .raffle
        .perform_upkeep(&keeper, Bytes::new())
        .await?
        .wait(1)
        .await?;
    let request_id = ctx.raffle.request_id(&receipt)?;

    let listener = tokio::spawn({
        let rpc = ctx.session.rpc.clone();
        let address = ctx.raffle.address;
        async move {
            wait_for_event::<Raffle::WinnerPicked>(&rpc, address, from_block, EVENT_TIMEOUT).await
        }
    });

    ctx.coordinator
        .fulfill_random_words(&keeper, request_id, ctx.raffle.address)
        .await?;

    let picked = listener.await.context("Event listener panicked")??;

    assert_eq!(picked.winner, ctx.raffle.recent_winner().await?);
    assert_eq!(ctx.raffle.raffle_state().await?, RaffleState::Open);
    assert_eq!(ctx.raffle.number_of_players().await?, U256::ZERO);
    assert!(ctx.raffle.latest_timestamp().await? > start_timestamp);

    let winner_index = entrants
        .iter()
        .position(|entrant| *entrant == picked.winner)
        .context("Winner is not one of the entrants")?;
    let pot = ctx.entrance_fee * U256::from(entrants.len());
    assert_eq!(
        ctx.session.rpc.balance(picked.winner).await?,
        starting_balances[winner_index] + pot
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker and compiled artifacts"]
async fn test_mock_offchain() -> Result<()> {
    let mut ctx = TestContext::new().await?;

    assert_eq!(
        interact::mock_offchain(&mut ctx.session).await?,
        UpkeepOutcome::NotNeeded
    );

    interact::enter_raffle(&mut ctx.session).await?;
    interact::advance_past_interval(&mut ctx.session).await?;

    match interact::mock_offchain(&mut ctx.session).await? {
        UpkeepOutcome::Performed {
            winner: Some(winner),
            ..
        } => assert_eq!(winner, ctx.session.wallet.address()),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let status = interact::raffle_status(&mut ctx.session).await?;
    assert_eq!(status.state, RaffleState::Open);
    assert_eq!(status.recent_winner, ctx.session.wallet.address());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a sepolia deployment, a funded PRIVATE_KEY and a registered upkeep"]
async fn test_live_keepers_and_vrf_pick_a_winner() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config_path =
        std::env::var("RAFFLE_CONFIG").unwrap_or_else(|_| RAFFLE_CONF_FILENAME.to_string());
    let config = RaffleConfig::load(Path::new(&config_path))?;
    let mut session = Session::connect(config, "sepolia").await?;

    let raffle = RaffleContract::new(session.contract_address(RAFFLE)?, session.rpc.clone());
    let entrance_fee = raffle.entrance_fee().await?;
    let start_timestamp = raffle.latest_timestamp().await?;
    let from_block = session.rpc.block_number().await?;

    raffle
        .enter_raffle(&session.wallet, entrance_fee)
        .await?
        .wait(1)
        .await?;
    let starting_balance = session.deployer_balance().await?;

    let picked: Raffle::WinnerPicked =
        wait_for_event(&session.rpc, raffle.address, from_block, LIVE_EVENT_TIMEOUT).await?;

    assert!(raffle.player(0).await.is_err());
    assert_eq!(picked.winner, session.wallet.address());
    assert_eq!(raffle.recent_winner().await?, session.wallet.address());
    assert_eq!(raffle.raffle_state().await?, RaffleState::Open);
    assert_eq!(session.deployer_balance().await?, starting_balance + entrance_fee);
    assert!(raffle.latest_timestamp().await? > start_timestamp);

    Ok(())
}

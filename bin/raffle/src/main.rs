//! raffle is a CLI tool to deploy, verify and play a VRF-driven raffle contract.

mod cli;

use alloy_core::primitives::utils::format_ether;
use anyhow::Result;
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command};
use raffle_deploy::{
    RaffleConfig, Session,
    interact::{self, UpkeepOutcome},
    run_scripts,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Command::Init { force } = cli.command {
        return init(&cli, force);
    }

    let mut config = RaffleConfig::load(&cli.config)?;
    if cli.no_cleanup {
        config.dev_chain.no_cleanup = true;
    }

    if let Command::Networks = cli.command {
        print_networks(&config);
        return Ok(());
    }

    let mut session = Session::connect(config, &cli.network).await?;

    match cli.command {
        Command::Deploy { tags } => {
            let scripts = run_scripts(&mut session, &tags).await?;
            tracing::info!(
                network = %session.network.name,
                scripts = scripts.len(),
                "✓ Deployment finished"
            );
        }
        Command::Enter => {
            let value = interact::enter_raffle(&mut session).await?;
            println!("Entered the raffle with {} ETH", format_ether(value));
        }
        Command::MockOffchain { advance_time } => {
            if advance_time {
                interact::advance_past_interval(&mut session).await?;
            }
            match interact::mock_offchain(&mut session).await? {
                UpkeepOutcome::NotNeeded => println!("No upkeep needed"),
                UpkeepOutcome::Performed {
                    request_id,
                    winner: Some(winner),
                } => println!("Request {} fulfilled, the winner is {}", request_id, winner),
                UpkeepOutcome::Performed {
                    request_id,
                    winner: None,
                } => println!("Upkeep performed, waiting for the VRF service to answer request {}", request_id),
            }
        }
        Command::Status => print_status(&mut session).await?,
        Command::Networks | Command::Init { .. } => {}
    }

    Ok(())
}

fn init(cli: &Cli, force: bool) -> Result<()> {
    let path = RaffleConfig::resolve_path(&cli.config);
    if path.exists() && !force {
        anyhow::bail!("{} already exists. Use --force to overwrite it.", path.display());
    }
    RaffleConfig::default().save_to_file(&path)
}

fn print_networks(config: &RaffleConfig) {
    let network_config = config.network_config();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Network",
        "Chain ID",
        "RPC",
        "Confirmations",
        "Entrance fee (ETH)",
        "Interval (s)",
        "VRF coordinator",
    ]);

    for name in config.networks.keys() {
        let Ok(network) = config.network(name) else {
            continue;
        };
        let rpc = network
            .settings
            .url
            .clone()
            .unwrap_or_else(|| "ephemeral dev chain".to_string());

        let (fee, interval, coordinator) = match network_config.get(network.chain_id()) {
            Ok(item) => (
                format_ether(item.raffle_entrance_fee),
                item.keepers_update_interval.to_string(),
                item.vrf_coordinator_v2
                    .map(|address| address.to_string())
                    .unwrap_or_else(|| "mock".to_string()),
            ),
            Err(_) => ("-".to_string(), "-".to_string(), "-".to_string()),
        };

        table.add_row(vec![
            network.name.clone(),
            network.chain_id().to_string(),
            rpc,
            network.wait_confirmations().to_string(),
            fee,
            interval,
            coordinator,
        ]);
    }

    println!("{table}");
}

async fn print_status(session: &mut Session) -> Result<()> {
    let status = interact::raffle_status(session).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Raffle", "Value"]);
    table.add_row(vec!["Address".to_string(), status.address.to_string()]);
    table.add_row(vec!["State".to_string(), status.state.to_string()]);
    table.add_row(vec![
        "Entrance fee (ETH)".to_string(),
        format_ether(status.entrance_fee),
    ]);
    table.add_row(vec!["Interval (s)".to_string(), status.interval.to_string()]);
    table.add_row(vec!["Players".to_string(), status.number_of_players.to_string()]);
    table.add_row(vec![
        "Last timestamp".to_string(),
        status.latest_timestamp.to_string(),
    ]);
    table.add_row(vec![
        "Recent winner".to_string(),
        status.recent_winner.to_string(),
    ]);
    table.add_row(vec![
        "Deployer balance (ETH)".to_string(),
        format_ether(session.deployer_balance().await?),
    ]);

    println!("{table}");
    Ok(())
}

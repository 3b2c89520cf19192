use std::path::PathBuf;

use clap::{Parser, Subcommand};
use raffle_deploy::{DeployTag, RAFFLE_CONF_FILENAME};
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "hardhat";

#[derive(Parser)]
#[command(name = "raffle")]
#[command(
    author,
    version,
    about = "Deploy, verify and play a VRF-driven raffle contract"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "RAFFLE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to act on, as named in the configuration file.
    ///
    /// `hardhat` starts a throwaway Anvil container for the duration of the command.
    #[arg(short, long, global = true, env = "RAFFLE_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Path to the project configuration file.
    #[arg(long, alias = "conf", global = true, env = "RAFFLE_CONFIG", default_value = RAFFLE_CONF_FILENAME)]
    pub config: PathBuf,

    /// Keep the dev chain container running when the program exits.
    #[arg(long, global = true, env = "RAFFLE_NO_CLEANUP")]
    pub no_cleanup: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the deployment scripts matching the given tags.
    Deploy {
        /// Tags selecting the scripts to run: all, mocks, raffle, frontend.
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        tags: Vec<DeployTag>,
    },

    /// Enter the raffle from the deployer account.
    Enter,

    /// Trigger the upkeep and, on a local chain, answer the randomness request.
    MockOffchain {
        /// Move a development chain's clock past the raffle interval first.
        #[arg(long)]
        advance_time: bool,
    },

    /// Show the state of the deployed raffle.
    Status,

    /// List the configured networks and their raffle parameters.
    Networks,

    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

//! raffle-deploy - Deployment and interaction tooling for a VRF-driven raffle contract.
//!
//! This crate deploys the raffle (and, on development networks, a mocked VRF
//! coordinator with a funded subscription), verifies it on Etherscan, and keeps
//! a front-end project's contract constants in sync.

pub mod artifacts;
pub mod config;
pub mod contracts;
pub mod deployments;
pub mod dev_chain;
pub mod docker;
pub mod events;
pub mod front_end;
pub mod interact;
pub mod network;
pub mod rpc;
pub mod scripts;
pub mod session;
pub mod verify;
pub mod wallet;

pub use config::{RAFFLE_CONF_FILENAME, RaffleConfig};
pub use contracts::{RaffleContract, RaffleState, VrfCoordinatorMock};
pub use network::{Network, NetworkConfig, NetworkConfigItem};
pub use scripts::{DeployScript, DeployTag, run_scripts, select_scripts};
pub use session::Session;
pub use wallet::Wallet;

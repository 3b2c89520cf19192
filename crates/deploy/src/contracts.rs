//! Typed bindings for the raffle contract and the mock VRF coordinator.
//!
//! The contracts are compiled outside of this workspace; only their ABI is
//! declared here.

use alloy_core::primitives::{Address, Bytes, U256, aliases::U96};
use alloy_sol_types::{SolCall, SolEvent, sol};
use anyhow::Context;
use derive_more::{Deref, Display};

use crate::{
    rpc::{Log, RpcClient, TransactionReceipt},
    wallet::{PendingTransaction, TxRequest, Wallet},
};

/// Contract name of the raffle artifact.
pub const RAFFLE: &str = "Raffle";

/// Contract name of the mock VRF coordinator artifact.
pub const VRF_COORDINATOR_V2_MOCK: &str = "VRFCoordinatorV2Mock";

/// Premium charged by the mock coordinator for every request: 0.25 LINK.
pub const BASE_FEE: U96 = U96::from_limbs([250_000_000_000_000_000, 0]);

/// LINK per gas used by the mock coordinator callback.
pub const GAS_PRICE_LINK: U96 = U96::from_limbs([1_000_000_000, 0]);

/// Amount the local subscription is funded with: 2 LINK.
pub const VRF_SUB_FUND_AMOUNT: U96 = U96::from_limbs([2_000_000_000_000_000_000, 0]);

sol! {
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    contract Raffle {
        constructor(
            address vrfCoordinatorV2,
            uint256 entranceFee,
            bytes32 gasLane,
            uint64 subscriptionId,
            uint32 callbackGasLimit,
            uint256 interval
        );

        event RaffleEnter(address indexed player);
        event RequestedRaffleWinner(uint256 indexed requestId);
        event WinnerPicked(address indexed winner);

        function enterRaffle() external payable;
        function checkUpkeep(bytes calldata checkData) external view returns (bool upkeepNeeded, bytes memory performData);
        function performUpkeep(bytes calldata performData) external;
        function getEntranceFee() external view returns (uint256);
        function getRecentWinner() external view returns (address);
        function getRaffleState() external view returns (uint8);
        function getPlayer(uint256 index) external view returns (address);
        function getNumberOfPlayers() external view returns (uint256);
        function getLatestTimeStamp() external view returns (uint256);
        function getInterval() external view returns (uint256);
    }

    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    contract VRFCoordinatorV2Mock {
        constructor(uint96 baseFee, uint96 gasPriceLink);

        event SubscriptionCreated(uint64 indexed subId, address owner);

        function createSubscription() external returns (uint64 subId);
        function fundSubscription(uint64 subId, uint96 amount) external;
        function addConsumer(uint64 subId, address consumer) external;
        function fulfillRandomWords(uint256 requestId, address consumer) external;
    }
}

/// State of the raffle as reported by `getRaffleState()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RaffleState {
    #[display("OPEN")]
    Open,
    #[display("CALCULATING")]
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Open),
            1 => Ok(Self::Calculating),
            other => anyhow::bail!("Unknown raffle state: {}", other),
        }
    }
}

/// Decode the first log of type `E` emitted by `address`.
pub fn find_event<E: SolEvent>(logs: &[Log], address: Address) -> Option<E> {
    logs.iter()
        .filter(|log| log.address == address)
        .filter(|log| log.topics.first() == Some(&E::SIGNATURE_HASH))
        .find_map(|log| E::decode_raw_log(log.topics.iter().copied(), &log.data).ok())
}

/// Address and transport of a deployed contract.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    pub address: Address,
    rpc: RpcClient,
}

impl ContractHandle {
    pub fn new(address: Address, rpc: RpcClient) -> Self {
        Self { address, rpc }
    }

    /// Run a view call and decode its return value.
    pub async fn call<C: SolCall>(&self, call: C) -> anyhow::Result<C::Return> {
        let output = self
            .rpc
            .call(self.address, call.abi_encode().into())
            .await
            .with_context(|| format!("Failed to call {}", C::SIGNATURE))?;

        C::abi_decode_returns(&output)
            .with_context(|| format!("Failed to decode return value of {}", C::SIGNATURE))
    }

    /// Send a state-changing call.
    pub async fn send<C: SolCall>(
        &self,
        wallet: &Wallet,
        call: C,
        value: U256,
    ) -> anyhow::Result<PendingTransaction> {
        let tx = TxRequest::call(self.address, call.abi_encode()).value(value);
        wallet
            .send(&self.rpc, tx)
            .await
            .with_context(|| format!("Failed to send {}", C::SIGNATURE))
    }
}

/// The deployed raffle.
#[derive(Debug, Clone, Deref)]
pub struct RaffleContract(ContractHandle);

impl RaffleContract {
    pub fn new(address: Address, rpc: RpcClient) -> Self {
        Self(ContractHandle::new(address, rpc))
    }

    pub async fn entrance_fee(&self) -> anyhow::Result<U256> {
        self.call(Raffle::getEntranceFeeCall {}).await
    }

    pub async fn enter_raffle(&self, wallet: &Wallet, value: U256) -> anyhow::Result<PendingTransaction> {
        self.send(wallet, Raffle::enterRaffleCall {}, value).await
    }

    /// Returns whether an upkeep is due, and the data to pass to `performUpkeep`.
    pub async fn check_upkeep(&self, check_data: Bytes) -> anyhow::Result<(bool, Bytes)> {
        let ret = self
            .call(Raffle::checkUpkeepCall {
                checkData: check_data,
            })
            .await?;
        Ok((ret.upkeepNeeded, ret.performData))
    }

    pub async fn perform_upkeep(
        &self,
        wallet: &Wallet,
        perform_data: Bytes,
    ) -> anyhow::Result<PendingTransaction> {
        self.send(
            wallet,
            Raffle::performUpkeepCall {
                performData: perform_data,
            },
            U256::ZERO,
        )
        .await
    }

    pub async fn recent_winner(&self) -> anyhow::Result<Address> {
        self.call(Raffle::getRecentWinnerCall {}).await
    }

    pub async fn raffle_state(&self) -> anyhow::Result<RaffleState> {
        RaffleState::try_from(self.call(Raffle::getRaffleStateCall {}).await?)
    }

    pub async fn player(&self, index: u64) -> anyhow::Result<Address> {
        self.call(Raffle::getPlayerCall {
            index: U256::from(index),
        })
        .await
    }

    pub async fn number_of_players(&self) -> anyhow::Result<U256> {
        self.call(Raffle::getNumberOfPlayersCall {}).await
    }

    pub async fn latest_timestamp(&self) -> anyhow::Result<U256> {
        self.call(Raffle::getLatestTimeStampCall {}).await
    }

    pub async fn interval(&self) -> anyhow::Result<U256> {
        self.call(Raffle::getIntervalCall {}).await
    }

    /// The VRF request ID emitted by a `performUpkeep` transaction.
    pub fn request_id(&self, receipt: &TransactionReceipt) -> anyhow::Result<U256> {
        find_event::<Raffle::RequestedRaffleWinner>(&receipt.logs, self.address)
            .map(|event| event.requestId)
            .context("No RequestedRaffleWinner event in receipt")
    }
}

/// The locally deployed VRF coordinator mock.
#[derive(Debug, Clone, Deref)]
pub struct VrfCoordinatorMock(ContractHandle);

impl VrfCoordinatorMock {
    pub fn new(address: Address, rpc: RpcClient) -> Self {
        Self(ContractHandle::new(address, rpc))
    }

    /// Encoded constructor arguments of the mock.
    pub fn constructor_args() -> Vec<u8> {
        use alloy_sol_types::SolConstructor;

        VRFCoordinatorV2Mock::constructorCall {
            baseFee: BASE_FEE,
            gasPriceLink: GAS_PRICE_LINK,
        }
        .abi_encode()
    }

    /// Create a subscription and return its ID, read from the `SubscriptionCreated` log.
    pub async fn create_subscription(&self, wallet: &Wallet) -> anyhow::Result<u64> {
        let receipt = self
            .send(wallet, VRFCoordinatorV2Mock::createSubscriptionCall {}, U256::ZERO)
            .await?
            .wait(1)
            .await?;

        self.subscription_id(&receipt)
    }

    pub fn subscription_id(&self, receipt: &TransactionReceipt) -> anyhow::Result<u64> {
        find_event::<VRFCoordinatorV2Mock::SubscriptionCreated>(&receipt.logs, self.address)
            .map(|event| event.subId)
            .context("No SubscriptionCreated event in receipt")
    }

    pub async fn fund_subscription(
        &self,
        wallet: &Wallet,
        subscription_id: u64,
        amount: U96,
    ) -> anyhow::Result<TransactionReceipt> {
        self.send(
            wallet,
            VRFCoordinatorV2Mock::fundSubscriptionCall {
                subId: subscription_id,
                amount,
            },
            U256::ZERO,
        )
        .await?
        .wait(1)
        .await
    }

    pub async fn add_consumer(
        &self,
        wallet: &Wallet,
        subscription_id: u64,
        consumer: Address,
    ) -> anyhow::Result<TransactionReceipt> {
        self.send(
            wallet,
            VRFCoordinatorV2Mock::addConsumerCall {
                subId: subscription_id,
                consumer,
            },
            U256::ZERO,
        )
        .await?
        .wait(1)
        .await
    }

    /// Act as the VRF service and answer a pending request.
    pub async fn fulfill_random_words(
        &self,
        wallet: &Wallet,
        request_id: U256,
        consumer: Address,
    ) -> anyhow::Result<TransactionReceipt> {
        self.send(
            wallet,
            VRFCoordinatorV2Mock::fulfillRandomWordsCall {
                requestId: request_id,
                consumer,
            },
            U256::ZERO,
        )
        .await?
        .wait(1)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{B256, address, keccak256};
    use alloy_sol_types::SolValue;

    fn topic(value: U256) -> B256 {
        B256::from(value)
    }

    fn log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            address,
            topics,
            data: data.into(),
            block_number: None,
            transaction_hash: None,
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(BASE_FEE.to_string(), "250000000000000000");
        assert_eq!(GAS_PRICE_LINK.to_string(), "1000000000");
        assert_eq!(VRF_SUB_FUND_AMOUNT.to_string(), "2000000000000000000");
    }

    #[test]
    fn test_raffle_state_from_u8() {
        assert_eq!(RaffleState::try_from(0).unwrap(), RaffleState::Open);
        assert_eq!(RaffleState::try_from(1).unwrap(), RaffleState::Calculating);
        assert!(RaffleState::try_from(2).is_err());
        assert_eq!(RaffleState::Calculating.to_string(), "CALCULATING");
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            Raffle::WinnerPicked::SIGNATURE_HASH,
            keccak256("WinnerPicked(address)")
        );
        assert_eq!(
            VRFCoordinatorV2Mock::SubscriptionCreated::SIGNATURE_HASH,
            keccak256("SubscriptionCreated(uint64,address)")
        );
    }

    #[test]
    fn test_subscription_id_from_receipt_logs() {
        let mock_address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
        let owner = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        let mock = VrfCoordinatorMock::new(mock_address, RpcClient::new("http://localhost:8545").unwrap());

        let logs = vec![
            // Same event from another contract is ignored.
            log(
                owner,
                vec![VRFCoordinatorV2Mock::SubscriptionCreated::SIGNATURE_HASH, topic(U256::from(9u64))],
                owner.abi_encode(),
            ),
            log(
                mock_address,
                vec![VRFCoordinatorV2Mock::SubscriptionCreated::SIGNATURE_HASH, topic(U256::from(1u64))],
                owner.abi_encode(),
            ),
        ];

        let found = find_event::<VRFCoordinatorV2Mock::SubscriptionCreated>(&logs, mock_address).unwrap();
        assert_eq!(found.subId, 1);
        assert_eq!(found.owner, owner);

        let receipt = TransactionReceipt {
            transaction_hash: B256::ZERO,
            block_number: 2,
            status: 1,
            contract_address: None,
            gas_used: U256::ZERO,
            effective_gas_price: None,
            logs,
        };
        assert_eq!(mock.subscription_id(&receipt).unwrap(), 1);
    }

    #[test]
    fn test_request_id_is_read_from_the_raffle_event() {
        let raffle_address = address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512");
        let mock_address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
        let raffle = RaffleContract::new(raffle_address, RpcClient::new("http://localhost:8545").unwrap());

        let receipt = TransactionReceipt {
            transaction_hash: B256::ZERO,
            block_number: 5,
            status: 1,
            contract_address: None,
            gas_used: U256::ZERO,
            effective_gas_price: None,
            logs: vec![
                // The coordinator's own request log comes first.
                log(mock_address, vec![B256::repeat_byte(0xab)], vec![]),
                log(
                    raffle_address,
                    vec![Raffle::RequestedRaffleWinner::SIGNATURE_HASH, topic(U256::from(1u64))],
                    vec![],
                ),
            ],
        };

        assert_eq!(raffle.request_id(&receipt).unwrap(), U256::from(1u64));

        let empty = TransactionReceipt {
            logs: vec![],
            ..receipt
        };
        assert!(raffle.request_id(&empty).is_err());
    }

    #[test]
    fn test_mock_constructor_args() {
        let args = VrfCoordinatorMock::constructor_args();
        assert_eq!(args.len(), 64);
        assert_eq!(U256::from_be_slice(&args[..32]), U256::from(250_000_000_000_000_000u64));
        assert_eq!(U256::from_be_slice(&args[32..]), U256::from(1_000_000_000u64));
    }
}

//! Waiting for a contract event.

use std::time::Duration;

use alloy_core::primitives::Address;
use alloy_sol_types::SolEvent;
use anyhow::Context;

use crate::rpc::{LogFilter, RpcClient};

/// Interval between two `eth_getLogs` polls.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait for the first `E` emitted by `address` at or after `from_block`.
///
/// Resolves with the decoded event. Fails when `timeout` elapses or when the
/// node returns an error.
pub async fn wait_for_event<E: SolEvent>(
    rpc: &RpcClient,
    address: Address,
    from_block: u64,
    timeout: Duration,
) -> anyhow::Result<E> {
    let filter = LogFilter::new(address, E::SIGNATURE_HASH, from_block);

    let poll = async {
        loop {
            let logs = rpc
                .logs(&filter)
                .await
                .with_context(|| format!("Failed to query {} logs", E::SIGNATURE))?;

            if let Some(log) = logs.first() {
                tracing::debug!(event = E::SIGNATURE, block = ?log.block_number, "Event fired");
                return E::decode_raw_log(log.topics.iter().copied(), &log.data)
                    .with_context(|| format!("Failed to decode {}", E::SIGNATURE));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .with_context(|| format!("Timed out after {:?} waiting for {}", timeout, E::SIGNATURE))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Raffle;

    #[tokio::test]
    async fn test_unreachable_node_is_an_error() {
        let rpc = RpcClient::new("http://127.0.0.1:1").unwrap();

        let result = wait_for_event::<Raffle::WinnerPicked>(
            &rpc,
            Address::ZERO,
            0,
            Duration::from_secs(5),
        )
        .await;

        assert!(result.is_err());
    }
}

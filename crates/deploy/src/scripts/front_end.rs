//! `99-update-front-end`: mirror the raffle address and ABI into the front-end project.

use anyhow::Result;

use crate::{contracts::RAFFLE, front_end, session::Session};

pub(super) async fn update_front_end(session: &mut Session) -> Result<()> {
    if !session.env.update_front_end {
        tracing::debug!("Front-end update disabled");
        return Ok(());
    }

    tracing::info!("Updating front end...");

    let raffle = session.deployments.get(RAFFLE)?;
    let paths = &session.config.front_end;

    let added = front_end::update_contract_addresses(&paths.addresses_file, session.chain_id(), raffle.address)?;
    front_end::update_abi(&paths.abi_file, &raffle.abi)?;

    tracing::info!(
        address = %raffle.address,
        added,
        addresses_file = %paths.addresses_file.display(),
        abi_file = %paths.abi_file.display(),
        "✓ Front end updated"
    );
    Ok(())
}

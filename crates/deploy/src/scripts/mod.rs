//! Deployment scripts, run in a fixed order and selected by tag.

mod front_end;
mod mocks;
mod raffle;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub use raffle::{MockSubscription, RaffleArgs};

use crate::session::Session;

/// Tags used to select deployment scripts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeployTag {
    All,
    Mocks,
    Raffle,
    Frontend,
}

/// The deployment scripts, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum DeployScript {
    #[strum(serialize = "00-deploy-mocks")]
    DeployMocks,
    #[strum(serialize = "01-deploy-raffle")]
    DeployRaffle,
    #[strum(serialize = "99-update-front-end")]
    UpdateFrontEnd,
}

impl DeployScript {
    pub fn tags(&self) -> &'static [DeployTag] {
        match self {
            Self::DeployMocks => &[DeployTag::All, DeployTag::Mocks],
            Self::DeployRaffle => &[DeployTag::All, DeployTag::Raffle],
            Self::UpdateFrontEnd => &[DeployTag::All, DeployTag::Frontend],
        }
    }

    async fn run(self, session: &mut Session) -> Result<()> {
        match self {
            Self::DeployMocks => mocks::deploy_mocks(session).await,
            Self::DeployRaffle => raffle::deploy_raffle(session).await,
            Self::UpdateFrontEnd => front_end::update_front_end(session).await,
        }
    }
}

/// Scripts carrying at least one of `tags`, in execution order.
pub fn select_scripts(tags: &[DeployTag]) -> Vec<DeployScript> {
    DeployScript::iter()
        .filter(|script| script.tags().iter().any(|tag| tags.contains(tag)))
        .collect()
}

/// Run the scripts selected by `tags`. The first failure aborts the run.
pub async fn run_scripts(session: &mut Session, tags: &[DeployTag]) -> Result<Vec<DeployScript>> {
    let scripts = select_scripts(tags);
    if scripts.is_empty() {
        tracing::warn!(?tags, "No deployment script matches the requested tags");
    }

    for script in &scripts {
        tracing::info!(%script, network = %session.network.name, "Running deployment script");
        script.run(session).await.map_err(|e| e.context(format!("Deployment script {} failed", script)))?;
    }

    Ok(scripts)
}

//! Collaborator capabilities the orchestrator drives.
//!
//! | Trait              | Real implementation                     |
//! |--------------------|-----------------------------------------|
//! | `DaoDirectory`     | `subgraph::SubgraphDirectory`           |
//! | `PluginInstaller`  | `installer::OnchainInstaller`           |
//! | `GovernanceClient` | `governance::GovernanceRpcClient`       |
//!
//! Tests substitute in-memory fakes for all three.

pub mod abi;
pub mod governance;
pub mod installer;
pub mod ipfs;
pub mod rpc;
pub mod subgraph;

use anyhow::Result;
use async_trait::async_trait;

use crate::dao::{DaoDescriptor, VotingMechanism};
use crate::installation::{InstallationRequest, InstallationResult};
use crate::orchestrator::StepSequence;
use crate::proposal::{ProposalDraft, ProposalMetadata, ProposalResult};

/// Looks DAOs up by address or ENS-style name.
#[async_trait]
pub trait DaoDirectory: Send + Sync {
    /// `Ok(None)` when the directory has no such DAO.
    async fn get_dao(&self, address_or_name: &str) -> Result<Option<DaoDescriptor>>;
}

/// Prepares plugin installations through the plugin setup processor.
pub trait PluginInstaller: Send + Sync {
    /// Build the two-step preparation sequence. Nothing is sent until the
    /// returned sequence is advanced.
    fn prepare_installation(
        &self,
        request: InstallationRequest,
    ) -> Result<StepSequence<InstallationResult>>;
}

/// Proposal creation against one governance mechanism.
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    fn mechanism(&self) -> VotingMechanism;

    /// Pin proposal metadata and return its content locator (`ipfs://...`).
    async fn pin_metadata(&self, metadata: &ProposalMetadata) -> Result<String>;

    /// Build the two-step proposal creation sequence for `draft`.
    fn create_proposal(
        &self,
        metadata_uri: String,
        draft: ProposalDraft,
    ) -> Result<StepSequence<ProposalResult>>;
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::ContractAddresses;
use crate::dao::{self, DaoDescriptor, VotingMechanism, VotingMechanismSelection};
use crate::errors::InstallerError;
use crate::installation::{
    self, DaoAction, InstallationRequest, InstallationResult, subdao_installation_abi,
};
use crate::primitives::{Address, TxHash};
use crate::proposal::{
    ExecutionParams, ProposalDraft, ProposalId, ProposalMetadata, ProposalResult,
};
use crate::sdk::{DaoDirectory, GovernanceClient, PluginInstaller};
use crate::ui::InstallerUI;

/// External capabilities the orchestrator drives.
pub struct Collaborators {
    pub directory: Arc<dyn DaoDirectory>,
    pub installer: Arc<dyn PluginInstaller>,
    pub token_voting: Arc<dyn GovernanceClient>,
    pub multisig: Arc<dyn GovernanceClient>,
}

/// Everything a completed run observed.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub child_dao: Address,
    pub child_ens: Option<String>,
    pub parent_dao: Address,
    pub voting: VotingMechanismSelection,
    pub prepare_tx: TxHash,
    pub plugin_address: Address,
    pub actions: Vec<DaoAction>,
    pub metadata_uri: String,
    pub proposal_tx: TxHash,
    pub proposal_id: ProposalId,
}

/// Installs the SubDAO plugin on a child DAO by proposal.
///
/// One `run` resolves both DAOs, prepares the installation, and raises a
/// proposal on the child DAO's voting plugin that applies it. Every failure
/// aborts the run; nothing already sent on-chain is rolled back, and a rerun
/// after a successful installation fails at the contract layer.
pub struct InstallationOrchestrator {
    contracts: ContractAddresses,
    collaborators: Collaborators,
    ui: Option<Arc<InstallerUI>>,
}

impl InstallationOrchestrator {
    pub fn new(contracts: ContractAddresses, collaborators: Collaborators) -> Self {
        Self {
            contracts,
            collaborators,
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<InstallerUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    fn ui(&self, f: impl FnOnce(&InstallerUI)) {
        if let Some(ref ui) = self.ui {
            f(ui);
        }
    }

    pub async fn resolve_dao(&self, address_or_name: &str) -> Result<DaoDescriptor> {
        let dao = self
            .collaborators
            .directory
            .get_dao(address_or_name)
            .await?
            .ok_or_else(|| InstallerError::DaoNotFound {
                address_or_name: address_or_name.to_string(),
            })?;

        tracing::info!(
            lookup = address_or_name,
            dao = %dao.address,
            ens = dao.ens.as_deref().unwrap_or("-"),
            plugins = dao.plugins.len(),
            "Resolved DAO"
        );
        Ok(dao)
    }

    /// Pick the child DAO's voting plugin.
    ///
    /// When more than one recognised voting plugin is installed the first one
    /// listed is used, and the choice is reported as a warning.
    pub fn resolve_voting_mechanism(
        &self,
        dao: &DaoDescriptor,
    ) -> Result<VotingMechanismSelection> {
        let selection = dao::resolve_voting_mechanism(dao)?;
        if selection.ambiguous {
            tracing::warn!(
                dao = %dao.address,
                selected = %selection.mechanism,
                "DAO has more than one voting plugin, using the first one listed"
            );
            self.ui(|ui| {
                ui.warn(&format!(
                    "More than one voting plugin installed; using the first listed ({})",
                    selection.mechanism
                ))
            });
        }
        Ok(selection)
    }

    /// Drive the preparation sequence: submit, then wait for the prepared plugin.
    pub async fn negotiate_installation(
        &self,
        request: InstallationRequest,
    ) -> Result<(TxHash, InstallationResult)> {
        let mut steps = self.collaborators.installer.prepare_installation(request)?;

        self.ui(|ui| ui.wait("Submitting installation preparation..."));
        let tx_hash = steps.submitted().await?;
        tracing::info!(sequence = steps.label(), tx_hash = %tx_hash, "Transaction submitted");
        self.ui(|ui| {
            ui.transaction("Transaction Hash", tx_hash);
            ui.wait("Waiting for preparation to be mined...");
        });

        let result = steps.confirmed().await?;
        tracing::info!(
            sequence = steps.label(),
            plugin = %result.plugin_address,
            helpers = result.helpers.len(),
            permissions = result.permissions.len(),
            "Installation prepared"
        );
        self.ui(|ui| {
            ui.done("Installation prepared");
            ui.detail("Installation Data", format!("{:?}", result));
            ui.field("SubDAO plugin address", result.plugin_address);
        });

        Ok((tx_hash, result))
    }

    /// Grant, apply-installation and revoke actions for the child DAO.
    pub fn build_installation_actions(
        &self,
        dao: Address,
        result: &InstallationResult,
    ) -> Vec<DaoAction> {
        installation::build_installation_actions(
            dao,
            self.contracts.plugin_setup_processor,
            result,
        )
    }

    fn governance_client(&self, mechanism: VotingMechanism) -> &Arc<dyn GovernanceClient> {
        match mechanism {
            VotingMechanism::TokenVoting => &self.collaborators.token_voting,
            VotingMechanism::Multisig => &self.collaborators.multisig,
        }
    }

    /// Pin the draft's metadata, then drive the proposal sequence on the
    /// client for `mechanism`. Returns the metadata URI and the proposal.
    pub async fn negotiate_proposal(
        &self,
        mechanism: VotingMechanism,
        draft: ProposalDraft,
    ) -> Result<(String, ProposalResult)> {
        let client = self.governance_client(mechanism);
        if client.mechanism() != mechanism || draft.execution.mechanism() != mechanism {
            return Err(InstallerError::ProposalMechanismMismatch {
                client: client.mechanism(),
                draft: draft.execution.mechanism(),
            }
            .into());
        }

        self.ui(|ui| ui.wait("Pinning proposal metadata..."));
        let metadata_uri = client.pin_metadata(&draft.metadata).await?;
        tracing::info!(uri = %metadata_uri, "Proposal metadata pinned");
        self.ui(|ui| ui.field("Metadata URI", &metadata_uri));

        let mut steps = client.create_proposal(metadata_uri.clone(), draft)?;

        self.ui(|ui| ui.wait("Submitting proposal..."));
        let tx_hash = steps.submitted().await?;
        tracing::info!(sequence = steps.label(), tx_hash = %tx_hash, "Transaction submitted");
        self.ui(|ui| {
            ui.transaction("Transaction Hash", tx_hash);
            ui.wait("Waiting for proposal to be mined...");
        });

        let result = steps.confirmed().await?;
        tracing::info!(
            sequence = steps.label(),
            proposal_id = %result.proposal_id,
            "Proposal created"
        );
        self.ui(|ui| {
            ui.done("Proposal created");
            ui.field("Proposal ID", &result.proposal_id);
        });

        Ok((metadata_uri, result))
    }

    pub async fn run(&self, child_dao: &str, parent_dao: &str) -> Result<RunReport> {
        self.run_at(child_dao, parent_dao, Utc::now()).await
    }

    /// `run` with an explicit clock, used for proposal dates.
    pub async fn run_at(
        &self,
        child_dao: &str,
        parent_dao: &str,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        self.ui(|ui| ui.stage("0. Resolve DAOs"));
        let child = self.resolve_dao(child_dao).await?;
        let parent = self.resolve_dao(parent_dao).await?;
        let voting = self.resolve_voting_mechanism(&child)?;

        self.ui(|ui| {
            ui.field("Child DAO Contract", child.address);
            if let Some(ens) = &child.ens {
                ui.field("Child DAO ENS", ens);
            }
            ui.field("Parent DAO Contract", parent.address);
            if let Some(ens) = &parent.ens {
                ui.field("Parent DAO ENS", ens);
            }
            ui.field("Voting Plugin address", voting.plugin_address);
            ui.field("Voting Plugin type", voting.mechanism);
            let plugins: Vec<&str> = child.plugins.iter().map(|p| p.id.as_str()).collect();
            ui.field("Child DAO Plugins", plugins.join(", "));
            ui.field("SubDAO Repo Address", self.contracts.plugin_repo);
        });

        self.ui(|ui| ui.stage("1. Prepare installation"));
        let request = InstallationRequest {
            dao: child.address,
            plugin_repo: self.contracts.plugin_repo,
            version: self.contracts.version,
            installation_abi: subdao_installation_abi(),
            installation_params: vec![parent.address.to_string()],
        };
        let (prepare_tx, installation) = self.negotiate_installation(request).await?;

        self.ui(|ui| ui.stage("2. Propose installation"));
        let actions = self.build_installation_actions(child.address, &installation);
        let draft = ProposalDraft {
            metadata: ProposalMetadata::subdao_installation(child_dao, parent_dao),
            plugin_address: voting.plugin_address,
            actions: actions.clone(),
            execution: ExecutionParams::for_mechanism(voting.mechanism, now),
        };
        let (metadata_uri, proposal) = self.negotiate_proposal(voting.mechanism, draft).await?;

        Ok(RunReport {
            child_dao: child.address,
            child_ens: child.ens,
            parent_dao: parent.address,
            voting,
            prepare_tx,
            plugin_address: installation.plugin_address,
            actions,
            metadata_uri,
            proposal_tx: proposal.tx_hash,
            proposal_id: proposal.proposal_id,
        })
    }
}

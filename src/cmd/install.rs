//! Plugin installation: the tool's only command.

use anyhow::{Context, Result};
use std::sync::Arc;

use super::super::Cli;

pub async fn cmd_install(cli: &Cli) -> Result<()> {
    use subdao_installer::config::{InstallerToml, config_path};
    use subdao_installer::dao::VotingMechanism;
    use subdao_installer::orchestrator::{Collaborators, InstallationOrchestrator};
    use subdao_installer::sdk::governance::GovernanceRpcClient;
    use subdao_installer::sdk::installer::OnchainInstaller;
    use subdao_installer::sdk::ipfs::IpfsPinner;
    use subdao_installer::sdk::rpc::RpcClient;
    use subdao_installer::sdk::subgraph::SubgraphDirectory;
    use subdao_installer::ui::InstallerUI;

    let path = config_path();
    let toml = InstallerToml::load_or_default(&path)?;
    for warning in toml.validate() {
        tracing::warn!(config = %path.display(), "{}", warning);
    }
    let network = toml.resolve(cli.network)?;

    let ui = Arc::new(InstallerUI::new(tracing::enabled!(tracing::Level::DEBUG)));

    let rpc = Arc::new(RpcClient::new(
        network.rpc_url.clone(),
        network.poll_interval,
        network.confirmation_timeout,
    ));
    let signer = rpc
        .resolve_signer(network.signer)
        .await
        .context("Failed to determine the signing account")?;
    ui.field("Deployer wallet address", signer);

    let pinner = Arc::new(IpfsPinner::new(
        network.ipfs_url.clone(),
        network.ipfs_api_key.clone(),
    ));
    let collaborators = Collaborators {
        directory: Arc::new(SubgraphDirectory::new(network.subgraph_url.clone())),
        installer: Arc::new(OnchainInstaller::new(
            rpc.clone(),
            signer,
            network.contracts.plugin_setup_processor,
        )),
        token_voting: Arc::new(GovernanceRpcClient::new(
            VotingMechanism::TokenVoting,
            rpc.clone(),
            pinner.clone(),
            signer,
        )),
        multisig: Arc::new(GovernanceRpcClient::new(
            VotingMechanism::Multisig,
            rpc,
            pinner,
            signer,
        )),
    };

    tracing::info!(network = %network.network, %signer, "Starting SubDAO plugin installation");
    let orchestrator =
        InstallationOrchestrator::new(network.contracts, collaborators).with_ui(ui.clone());

    match orchestrator
        .run(&cli.child_dao_address, &cli.parent_dao_address)
        .await
    {
        Ok(report) => {
            ui.finish(&format!(
                "Proposal {} created on {}",
                report.proposal_id, network.network
            ));
            Ok(())
        }
        Err(e) => {
            ui.fail("Installation aborted");
            Err(e)
        }
    }
}

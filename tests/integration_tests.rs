//! Integration tests for the subdao-installer binary
//!
//! These run the CLI end to end up to the point where it would reach the
//! network, so every case here fails (or succeeds) before any request is made.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CHILD: &str = "0x00000000000000000000000000000000000000c0";
const PARENT: &str = "0x00000000000000000000000000000000000000d0";

/// Helper to create an installer Command isolated from the caller's environment
fn installer(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("subdao-installer");
    cmd.current_dir(dir.path())
        .env("SUBDAO_INSTALLER_CONFIG", dir.path().join("installer.toml"))
        .env_remove("SUBDAO_RPC_URL")
        .env_remove("SUBDAO_SUBGRAPH_URL")
        .env_remove("SUBDAO_IPFS_URL")
        .env_remove("SUBDAO_IPFS_API_KEY")
        .env_remove("SUBDAO_SIGNER");
    cmd
}

fn write_config(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("installer.toml"), content).unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help_lists_flags() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--child-dao-address"))
            .stdout(predicate::str::contains("--parent-dao-address"))
            .stdout(predicate::str::contains("--network"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        installer(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_missing_required_args() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .args(["-c", CHILD])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--parent-dao-address"));
    }

    #[test]
    fn test_unknown_network_rejected() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .args(["-c", CHILD, "-p", PARENT, "-n", "ropsten"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("ropsten"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_remote_network_without_config_fails_before_network_calls() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .args(["-c", CHILD, "-p", PARENT, "-n", "mainnet"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("rpc_url"));
    }

    #[test]
    fn test_local_network_still_needs_contract_addresses() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .args(["-c", CHILD, "-p", PARENT, "-n", "local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("plugin_setup_processor"));
    }

    #[test]
    fn test_malformed_config_reported() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[networks.mainnet\nrpc_url = ");
        installer(&dir)
            .args(["-c", CHILD, "-p", PARENT, "-n", "mainnet"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse installer.toml"));
    }

    #[test]
    fn test_invalid_signer_env_reported() {
        let dir = TempDir::new().unwrap();
        installer(&dir)
            .env("SUBDAO_SIGNER", "not-an-address")
            .args(["-c", CHILD, "-p", PARENT, "-n", "local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("SUBDAO_SIGNER"));
    }
}

//! Installer configuration.
//!
//! Settings are layered: built-in defaults, then `installer.toml`, then
//! environment variables (a `.env` file is honoured), then the CLI network
//! argument that selects which `[networks.<name>]` table applies.
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! poll_interval_ms = 1000
//! confirmation_timeout_secs = 600
//!
//! [plugin]
//! release = 1
//! build = 1
//!
//! [networks.local]
//! rpc_url = "http://127.0.0.1:8545"
//! subgraph_url = "http://127.0.0.1:8000/subgraphs/name/aragon/osx"
//! ipfs_url = "http://127.0.0.1:5001"
//! plugin_setup_processor = "0x..."
//! plugin_repo = "0x..."
//! # signer = "0x..."   # defaults to the node's first unlocked account
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::installation::VersionTag;
use crate::primitives::Address;

pub const CONFIG_PATH_ENV: &str = "SUBDAO_INSTALLER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "installer.toml";

/// Networks the installer knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Goerli,
    Polygon,
    Mumbai,
    Base,
    BaseGoerli,
    Local,
}

impl Network {
    pub const ALL: [Network; 7] = [
        Network::Mainnet,
        Network::Goerli,
        Network::Polygon,
        Network::Mumbai,
        Network::Base,
        Network::BaseGoerli,
        Network::Local,
    ];
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Goerli => "goerli",
            Network::Polygon => "polygon",
            Network::Mumbai => "mumbai",
            Network::Base => "base",
            Network::BaseGoerli => "baseGoerli",
            Network::Local => "local",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid network '{}'. Valid values: mainnet, goerli, polygon, mumbai, base, baseGoerli, local",
                    s
                )
            })
    }
}

/// Polling and timeout settings shared by all networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Interval between transaction receipt polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long to wait for a submitted transaction to be mined
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_confirmation_timeout_secs() -> u64 {
    600
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

/// Version of the SubDAO plugin to install.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_release")]
    pub release: u8,
    #[serde(default = "default_build")]
    pub build: u16,
}

fn default_release() -> u8 {
    1
}

fn default_build() -> u16 {
    1
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            release: default_release(),
            build: default_build(),
        }
    }
}

/// Endpoints and contract addresses for one network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub subgraph_url: Option<String>,
    #[serde(default)]
    pub ipfs_url: Option<String>,
    #[serde(default)]
    pub ipfs_api_key: Option<String>,
    #[serde(default)]
    pub plugin_setup_processor: Option<Address>,
    /// SubDAO plugin repository
    #[serde(default)]
    pub plugin_repo: Option<Address>,
    #[serde(default)]
    pub signer: Option<Address>,
}

impl NetworkSettings {
    fn local_defaults() -> Self {
        Self {
            rpc_url: Some("http://127.0.0.1:8545".to_string()),
            subgraph_url: Some("http://127.0.0.1:8000/subgraphs/name/aragon/osx".to_string()),
            ipfs_url: Some("http://127.0.0.1:5001".to_string()),
            ..Self::default()
        }
    }

    /// Fill unset fields from `fallback`.
    fn or(self, fallback: NetworkSettings) -> Self {
        Self {
            rpc_url: self.rpc_url.or(fallback.rpc_url),
            subgraph_url: self.subgraph_url.or(fallback.subgraph_url),
            ipfs_url: self.ipfs_url.or(fallback.ipfs_url),
            ipfs_api_key: self.ipfs_api_key.or(fallback.ipfs_api_key),
            plugin_setup_processor: self.plugin_setup_processor.or(fallback.plugin_setup_processor),
            plugin_repo: self.plugin_repo.or(fallback.plugin_repo),
            signer: self.signer.or(fallback.signer),
        }
    }
}

/// Contents of `installer.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallerToml {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub networks: HashMap<String, NetworkSettings>,
}

impl InstallerToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse installer.toml")
    }

    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn network_settings(&self, network: Network) -> NetworkSettings {
        let name = network.to_string();
        let from_file = self
            .networks
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
            .map(|(_, settings)| settings.clone())
            .unwrap_or_default();

        match network {
            Network::Local => from_file.or(NetworkSettings::local_defaults()),
            _ => from_file,
        }
    }

    /// Resolve the settings for `network`, applying environment overrides.
    pub fn resolve(&self, network: Network) -> Result<NetworkConfig> {
        self.resolve_with_env(network, |key| std::env::var(key).ok())
    }

    pub fn resolve_with_env(
        &self,
        network: Network,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<NetworkConfig> {
        let mut settings = self.network_settings(network);

        if let Some(url) = env("SUBDAO_RPC_URL") {
            settings.rpc_url = Some(url);
        }
        if let Some(url) = env("SUBDAO_SUBGRAPH_URL") {
            settings.subgraph_url = Some(url);
        }
        if let Some(url) = env("SUBDAO_IPFS_URL") {
            settings.ipfs_url = Some(url);
        }
        if let Some(key) = env("SUBDAO_IPFS_API_KEY") {
            settings.ipfs_api_key = Some(key);
        }
        if let Some(signer) = env("SUBDAO_SIGNER") {
            settings.signer = Some(
                signer
                    .parse()
                    .context("SUBDAO_SIGNER is not a valid address")?,
            );
        }

        let missing = |field: &str| {
            anyhow::anyhow!(
                "Network '{}' is missing '{}'. Set it under [networks.{}] in {}",
                network,
                field,
                network,
                DEFAULT_CONFIG_FILE
            )
        };

        Ok(NetworkConfig {
            network,
            rpc_url: settings.rpc_url.ok_or_else(|| missing("rpc_url"))?,
            subgraph_url: settings.subgraph_url.ok_or_else(|| missing("subgraph_url"))?,
            ipfs_url: settings.ipfs_url.ok_or_else(|| missing("ipfs_url"))?,
            ipfs_api_key: settings.ipfs_api_key,
            signer: settings.signer,
            contracts: ContractAddresses {
                plugin_setup_processor: settings
                    .plugin_setup_processor
                    .ok_or_else(|| missing("plugin_setup_processor"))?,
                plugin_repo: settings.plugin_repo.ok_or_else(|| missing("plugin_repo"))?,
                version: VersionTag {
                    release: self.plugin.release,
                    build: self.plugin.build,
                },
            },
            poll_interval: Duration::from_millis(self.defaults.poll_interval_ms),
            confirmation_timeout: Duration::from_secs(self.defaults.confirmation_timeout_secs),
        })
    }

    /// Warnings about settings that would make a run fail or misbehave.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for name in self.networks.keys() {
            if name.parse::<Network>().is_err() {
                warnings.push(format!("Unknown network '{}' in [networks]", name));
            }
        }
        for network in Network::ALL {
            let has_table = self
                .networks
                .keys()
                .any(|k| k.eq_ignore_ascii_case(&network.to_string()));
            if !has_table {
                continue;
            }
            let settings = self.network_settings(network);
            if settings.plugin_setup_processor.is_none() {
                warnings.push(format!("[networks.{}] has no plugin_setup_processor", network));
            }
            if settings.plugin_repo.is_none() {
                warnings.push(format!("[networks.{}] has no plugin_repo", network));
            }
        }
        if self.defaults.poll_interval_ms == 0 {
            warnings.push("defaults.poll_interval_ms must be greater than zero".to_string());
        }

        warnings
    }
}

/// Contract addresses the orchestrator encodes calls against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub plugin_setup_processor: Address,
    pub plugin_repo: Address,
    pub version: VersionTag,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub rpc_url: String,
    pub subgraph_url: String,
    pub ipfs_url: String,
    pub ipfs_api_key: Option<String>,
    pub signer: Option<Address>,
    pub contracts: ContractAddresses,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
}

/// Location of `installer.toml`: `$SUBDAO_INSTALLER_CONFIG` or the working directory.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PSP: &str = "0x00000000000000000000000000000000000000f0";
    const REPO: &str = "0x00000000000000000000000000000000000000f1";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn local_toml() -> String {
        format!(
            "[networks.local]\nplugin_setup_processor = \"{}\"\nplugin_repo = \"{}\"\n",
            PSP, REPO
        )
    }

    #[test]
    fn network_parses_all_names_case_insensitively() {
        for n in Network::ALL {
            assert_eq!(n.to_string().parse::<Network>().unwrap(), n);
        }
        assert_eq!("BASEGOERLI".parse::<Network>().unwrap(), Network::BaseGoerli);
        let err = "sepolia".parse::<Network>().unwrap_err();
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let toml = InstallerToml::parse("").unwrap();
        assert_eq!(toml.defaults.poll_interval_ms, 1000);
        assert_eq!(toml.defaults.confirmation_timeout_secs, 600);
        assert_eq!(toml.plugin.release, 1);
        assert_eq!(toml.plugin.build, 1);
    }

    #[test]
    fn local_network_fills_endpoint_defaults() {
        let toml = InstallerToml::parse(&local_toml()).unwrap();
        let cfg = toml.resolve_with_env(Network::Local, no_env).unwrap();
        assert_eq!(cfg.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(cfg.ipfs_url, "http://127.0.0.1:5001");
        assert_eq!(cfg.contracts.plugin_setup_processor, PSP.parse().unwrap());
        assert_eq!(cfg.contracts.plugin_repo, REPO.parse().unwrap());
        assert_eq!(cfg.poll_interval, Duration::from_millis(1000));
    }

    #[test]
    fn missing_contract_addresses_are_reported() {
        let toml = InstallerToml::default();
        let err = toml.resolve_with_env(Network::Local, no_env).unwrap_err();
        assert!(err.to_string().contains("plugin_setup_processor"));
    }

    #[test]
    fn remote_networks_have_no_endpoint_defaults() {
        let content = format!(
            "[networks.polygon]\nplugin_setup_processor = \"{}\"\nplugin_repo = \"{}\"\n",
            PSP, REPO
        );
        let toml = InstallerToml::parse(&content).unwrap();
        let err = toml.resolve_with_env(Network::Polygon, no_env).unwrap_err();
        assert!(err.to_string().contains("rpc_url"));
    }

    #[test]
    fn env_overrides_file_values() {
        let toml = InstallerToml::parse(&local_toml()).unwrap();
        let signer = "0x00000000000000000000000000000000000000ee";
        let cfg = toml
            .resolve_with_env(Network::Local, |key| match key {
                "SUBDAO_RPC_URL" => Some("http://node:8545".to_string()),
                "SUBDAO_SIGNER" => Some(signer.to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(cfg.rpc_url, "http://node:8545");
        assert_eq!(cfg.signer, Some(signer.parse().unwrap()));
    }

    #[test]
    fn invalid_signer_env_is_an_error() {
        let toml = InstallerToml::parse(&local_toml()).unwrap();
        let result = toml.resolve_with_env(Network::Local, |key| {
            (key == "SUBDAO_SIGNER").then(|| "alice".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn network_table_keys_match_case_insensitively() {
        let content = format!(
            "[networks.basegoerli]\nrpc_url = \"http://b\"\nsubgraph_url = \"http://s\"\nipfs_url = \"http://i\"\nplugin_setup_processor = \"{}\"\nplugin_repo = \"{}\"\n",
            PSP, REPO
        );
        let toml = InstallerToml::parse(&content).unwrap();
        let cfg = toml.resolve_with_env(Network::BaseGoerli, no_env).unwrap();
        assert_eq!(cfg.rpc_url, "http://b");
    }

    #[test]
    fn validate_flags_unknown_networks_and_missing_addresses() {
        let toml = InstallerToml::parse("[networks.sepolia]\n[networks.mainnet]\n").unwrap();
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("sepolia")));
        assert!(warnings.iter().any(|w| w.contains("mainnet") && w.contains("plugin_repo")));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = InstallerToml::load_or_default(&dir.path().join("installer.toml")).unwrap();
        assert!(toml.networks.is_empty());
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installer.toml");
        fs::write(&path, "[defaults\n").unwrap();
        let err = InstallerToml::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse installer.toml"));
    }
}

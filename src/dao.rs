//! DAO descriptors and governance-mechanism resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::InstallerError;
use crate::primitives::Address;

pub const TOKEN_VOTING_PLUGIN_ID: &str = "token-voting.plugin.dao.eth";
pub const MULTISIG_PLUGIN_ID: &str = "multisig.plugin.dao.eth";

/// A plugin installed on a DAO, as reported by the DAO directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub id: String,
    pub instance_address: Address,
}

/// Snapshot of a DAO taken once per lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoDescriptor {
    pub address: Address,
    #[serde(default)]
    pub ens: Option<String>,
    /// Installed plugins in the order the directory returned them.
    pub plugins: Vec<InstalledPlugin>,
}

/// Governance mechanisms a proposal can be raised through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VotingMechanism {
    TokenVoting,
    Multisig,
}

impl VotingMechanism {
    pub const ALL: [VotingMechanism; 2] = [VotingMechanism::TokenVoting, VotingMechanism::Multisig];

    pub fn plugin_id(self) -> &'static str {
        match self {
            VotingMechanism::TokenVoting => TOKEN_VOTING_PLUGIN_ID,
            VotingMechanism::Multisig => MULTISIG_PLUGIN_ID,
        }
    }

    pub fn from_plugin_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.plugin_id() == id)
    }
}

impl fmt::Display for VotingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotingMechanism::TokenVoting => write!(f, "token-voting"),
            VotingMechanism::Multisig => write!(f, "multisig"),
        }
    }
}

/// The voting plugin a proposal will be submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingMechanismSelection {
    pub mechanism: VotingMechanism,
    pub plugin_address: Address,
    /// Set when more than one recognised voting plugin was installed.
    pub ambiguous: bool,
}

/// Pick the DAO's voting plugin.
///
/// The first plugin (in directory order) whose id names a known mechanism
/// wins. `ambiguous` records whether later entries also matched so callers
/// can surface the situation instead of relying on the ordering silently.
pub fn resolve_voting_mechanism(
    descriptor: &DaoDescriptor,
) -> Result<VotingMechanismSelection, InstallerError> {
    let mut matches = descriptor.plugins.iter().filter_map(|plugin| {
        VotingMechanism::from_plugin_id(&plugin.id).map(|m| (m, plugin.instance_address))
    });

    let (mechanism, plugin_address) = matches.next().ok_or_else(|| {
        InstallerError::VotingPluginNotFound {
            dao: descriptor.address.to_string(),
        }
    })?;

    Ok(VotingMechanismSelection {
        mechanism,
        plugin_address,
        ambiguous: matches.next().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address(bytes)
    }

    fn dao_with(plugins: &[(&str, u8)]) -> DaoDescriptor {
        DaoDescriptor {
            address: addr(0xd0),
            ens: None,
            plugins: plugins
                .iter()
                .map(|(id, a)| InstalledPlugin {
                    id: id.to_string(),
                    instance_address: addr(*a),
                })
                .collect(),
        }
    }

    #[test]
    fn empty_plugin_list_has_no_voting_plugin() {
        let err = resolve_voting_mechanism(&dao_with(&[])).unwrap_err();
        assert!(matches!(err, InstallerError::VotingPluginNotFound { .. }));
    }

    #[test]
    fn unrelated_plugins_do_not_match() {
        let dao = dao_with(&[("admin.plugin.dao.eth", 1), ("subdao.plugin.dao.eth", 2)]);
        assert!(resolve_voting_mechanism(&dao).is_err());
    }

    #[test]
    fn single_token_voting_plugin_is_selected() {
        let dao = dao_with(&[(TOKEN_VOTING_PLUGIN_ID, 0xaa)]);
        let sel = resolve_voting_mechanism(&dao).unwrap();
        assert_eq!(sel.mechanism, VotingMechanism::TokenVoting);
        assert_eq!(sel.plugin_address, addr(0xaa));
        assert!(!sel.ambiguous);
    }

    #[test]
    fn single_multisig_plugin_is_selected() {
        let dao = dao_with(&[("admin.plugin.dao.eth", 1), (MULTISIG_PLUGIN_ID, 0xbb)]);
        let sel = resolve_voting_mechanism(&dao).unwrap();
        assert_eq!(sel.mechanism, VotingMechanism::Multisig);
        assert_eq!(sel.plugin_address, addr(0xbb));
    }

    #[test]
    fn first_match_wins_and_is_flagged_ambiguous() {
        let dao = dao_with(&[(MULTISIG_PLUGIN_ID, 0xbb), (TOKEN_VOTING_PLUGIN_ID, 0xaa)]);
        let sel = resolve_voting_mechanism(&dao).unwrap();
        assert_eq!(sel.mechanism, VotingMechanism::Multisig);
        assert!(sel.ambiguous);
    }

    #[test]
    fn plugin_ids_round_trip_through_mechanism() {
        for m in VotingMechanism::ALL {
            assert_eq!(VotingMechanism::from_plugin_id(m.plugin_id()), Some(m));
        }
        assert_eq!(VotingMechanism::from_plugin_id("token-voting"), None);
    }
}

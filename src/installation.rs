//! Plugin installation requests, prepared results and the action bundle that
//! applies them.

use serde::{Deserialize, Serialize};

use crate::errors::InstallerError;
use crate::primitives::{Address, H256};
use crate::sdk::abi::{self, Token};

pub const GRANT_SIGNATURE: &str = "grant(address,address,bytes32)";
pub const REVOKE_SIGNATURE: &str = "revoke(address,address,bytes32)";
pub const APPLY_INSTALLATION_SIGNATURE: &str = "applyInstallation(address,(((uint8,uint16),address),address,(uint8,address,address,address,bytes32)[],bytes32))";

/// `keccak256("ROOT_PERMISSION")`, the permission the setup processor needs
/// on the DAO while it wires up a new plugin.
pub fn root_permission_id() -> H256 {
    H256(abi::keccak256(b"ROOT_PERMISSION"))
}

/// One input of the plugin setup's `prepareInstallation` data, as published in
/// the plugin's build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataAbiInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub internal_type: String,
    #[serde(default)]
    pub description: String,
}

/// Release/build pair identifying a version published in a plugin repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    pub release: u8,
    pub build: u16,
}

impl VersionTag {
    fn token(self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.release.into()),
            Token::Uint(self.build.into()),
        ])
    }
}

/// The SubDAO setup takes a single input: the parent DAO address.
pub fn subdao_installation_abi() -> Vec<MetadataAbiInput> {
    vec![MetadataAbiInput {
        name: "_data".to_string(),
        kind: "address".to_string(),
        internal_type: "address".to_string(),
        description: "parent contract address".to_string(),
    }]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    pub dao: Address,
    pub plugin_repo: Address,
    pub version: VersionTag,
    pub installation_abi: Vec<MetadataAbiInput>,
    pub installation_params: Vec<String>,
}

impl InstallationRequest {
    /// ABI-encode `installation_params` according to `installation_abi`.
    pub fn encoded_params(&self) -> Result<Vec<u8>, InstallerError> {
        if self.installation_abi.len() != self.installation_params.len() {
            return Err(InstallerError::InvalidInstallationParam {
                name: "*".to_string(),
                message: format!(
                    "expected {} values, got {}",
                    self.installation_abi.len(),
                    self.installation_params.len()
                ),
            });
        }

        let tokens = self
            .installation_abi
            .iter()
            .zip(&self.installation_params)
            .map(|(input, value)| {
                Token::parse(&input.kind, value).map_err(|e| {
                    InstallerError::InvalidInstallationParam {
                        name: input.name.clone(),
                        message: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(abi::encode(&tokens))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PermissionOperation {
    Grant = 0,
    Revoke = 1,
    GrantWithCondition = 2,
}

impl TryFrom<u128> for PermissionOperation {
    type Error = anyhow::Error;

    fn try_from(value: u128) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PermissionOperation::Grant),
            1 => Ok(PermissionOperation::Revoke),
            2 => Ok(PermissionOperation::GrantWithCondition),
            other => anyhow::bail!("Unknown permission operation {}", other),
        }
    }
}

/// A permission change the setup processor will apply during installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiTargetPermission {
    pub operation: PermissionOperation,
    pub r#where: Address,
    pub who: Address,
    pub condition: Address,
    pub permission_id: H256,
}

impl MultiTargetPermission {
    fn token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.operation as u128),
            Token::Address(self.r#where),
            Token::Address(self.who),
            Token::Address(self.condition),
            Token::FixedBytes(self.permission_id),
        ])
    }
}

/// Outcome of a confirmed installation preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub plugin_address: Address,
    pub plugin_repo: Address,
    pub version: VersionTag,
    pub helpers: Vec<Address>,
    pub permissions: Vec<MultiTargetPermission>,
}

impl InstallationResult {
    /// `keccak256(abi.encode(helpers))`, checked by the setup processor on apply.
    pub fn helpers_hash(&self) -> H256 {
        let helpers = self.helpers.iter().copied().map(Token::Address).collect();
        H256(abi::keccak256(&abi::encode(&[Token::Array(helpers)])))
    }
}

/// A call the DAO executes when a proposal passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoAction {
    pub to: Address,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl DaoAction {
    pub fn token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Bytes(self.data.clone()),
        ])
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

/// Encode the three actions that apply a prepared installation, in order:
/// grant the setup processor root on the DAO, apply the installation, revoke
/// the grant. Deterministic and side-effect free.
pub fn build_installation_actions(
    dao: Address,
    plugin_setup_processor: Address,
    result: &InstallationResult,
) -> Vec<DaoAction> {
    let permission = |signature: &str| DaoAction {
        to: dao,
        value: 0,
        data: abi::encode_call(
            signature,
            &[
                Token::Address(dao),
                Token::Address(plugin_setup_processor),
                Token::FixedBytes(root_permission_id()),
            ],
        ),
    };

    let params = Token::Tuple(vec![
        Token::Tuple(vec![result.version.token(), Token::Address(result.plugin_repo)]),
        Token::Address(result.plugin_address),
        Token::Array(result.permissions.iter().map(MultiTargetPermission::token).collect()),
        Token::FixedBytes(result.helpers_hash()),
    ]);
    let apply = DaoAction {
        to: plugin_setup_processor,
        value: 0,
        data: abi::encode_call(APPLY_INSTALLATION_SIGNATURE, &[Token::Address(dao), params]),
    };

    vec![permission(GRANT_SIGNATURE), apply, permission(REVOKE_SIGNATURE)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address(bytes)
    }

    fn sample_result(permissions: usize) -> InstallationResult {
        InstallationResult {
            plugin_address: addr(0x50),
            plugin_repo: addr(0x52),
            version: VersionTag { release: 1, build: 1 },
            helpers: vec![addr(0x60)],
            permissions: (0..permissions)
                .map(|i| MultiTargetPermission {
                    operation: PermissionOperation::Grant,
                    r#where: addr(0xd0),
                    who: addr(0x50 + i as u8),
                    condition: Address::ZERO,
                    permission_id: H256([i as u8; 32]),
                })
                .collect(),
        }
    }

    #[test]
    fn always_three_actions_in_grant_install_revoke_order() {
        for n in [0, 1, 4] {
            let actions = build_installation_actions(addr(0xd0), addr(0xf0), &sample_result(n));
            assert_eq!(actions.len(), 3);
            assert_eq!(&actions[0].data[..4], &abi::selector(GRANT_SIGNATURE));
            assert_eq!(&actions[1].data[..4], &abi::selector(APPLY_INSTALLATION_SIGNATURE));
            assert_eq!(&actions[2].data[..4], &abi::selector(REVOKE_SIGNATURE));
        }
    }

    #[test]
    fn permission_actions_target_the_dao_and_install_targets_the_processor() {
        let actions = build_installation_actions(addr(0xd0), addr(0xf0), &sample_result(1));
        assert_eq!(actions[0].to, addr(0xd0));
        assert_eq!(actions[1].to, addr(0xf0));
        assert_eq!(actions[2].to, addr(0xd0));
        assert!(actions.iter().all(|a| a.value == 0));
        // grant and revoke carry identical arguments
        assert_eq!(actions[0].data[4..], actions[2].data[4..]);
    }

    #[test]
    fn grant_names_processor_and_root_permission() {
        let actions = build_installation_actions(addr(0xd0), addr(0xf0), &sample_result(0));
        let dec = abi::AbiDecoder::new(&actions[0].data[4..]);
        assert_eq!(dec.address(0).unwrap(), addr(0xd0));
        assert_eq!(dec.address(32).unwrap(), addr(0xf0));
        assert_eq!(dec.h256(64).unwrap(), root_permission_id());
    }

    #[test]
    fn apply_installation_carries_the_prepared_setup() {
        let result = sample_result(2);
        let actions = build_installation_actions(addr(0xd0), addr(0xf0), &result);
        let dec = abi::AbiDecoder::new(&actions[1].data[4..]);

        assert_eq!(dec.address(0).unwrap(), addr(0xd0));
        let params = dec.follow(0, 32).unwrap();
        let slot = |i| abi::AbiDecoder::slot(params, i);
        // ((release, build), repo) and the plugin address are inlined
        assert_eq!(dec.uint(slot(0)).unwrap(), 1);
        assert_eq!(dec.uint(slot(1)).unwrap(), 1);
        assert_eq!(dec.address(slot(2)).unwrap(), addr(0x52));
        assert_eq!(dec.address(slot(3)).unwrap(), addr(0x50));
        assert_eq!(dec.h256(slot(5)).unwrap(), result.helpers_hash());

        let permissions = dec.follow(params, slot(4)).unwrap();
        assert_eq!(dec.usize(permissions).unwrap(), 2);
        for (i, expected) in result.permissions.iter().enumerate() {
            let item = |field| abi::AbiDecoder::slot(permissions, 1 + 5 * i + field);
            assert_eq!(dec.uint(item(0)).unwrap(), expected.operation as u128);
            assert_eq!(dec.address(item(1)).unwrap(), expected.r#where);
            assert_eq!(dec.address(item(2)).unwrap(), expected.who);
            assert_eq!(dec.address(item(3)).unwrap(), expected.condition);
            assert_eq!(dec.h256(item(4)).unwrap(), expected.permission_id);
        }
    }

    #[test]
    fn helpers_hash_is_keccak_of_encoded_address_array() {
        let result = sample_result(0);
        let mut encoded = Vec::new();
        encoded.extend_from_slice(&[0u8; 31]);
        encoded.push(0x20);
        encoded.extend_from_slice(&[0u8; 31]);
        encoded.push(1);
        encoded.extend_from_slice(&[0u8; 12]);
        encoded.extend_from_slice(addr(0x60).as_bytes());
        assert_eq!(result.helpers_hash(), H256(abi::keccak256(&encoded)));
    }

    #[test]
    fn build_is_deterministic() {
        let result = sample_result(2);
        assert_eq!(
            build_installation_actions(addr(1), addr(2), &result),
            build_installation_actions(addr(1), addr(2), &result)
        );
    }

    #[test]
    fn encoded_params_for_single_address() {
        let request = InstallationRequest {
            dao: addr(1),
            plugin_repo: addr(2),
            version: VersionTag { release: 1, build: 1 },
            installation_abi: vec![MetadataAbiInput {
                name: "_data".into(),
                kind: "address".into(),
                internal_type: "address".into(),
                description: "parent contract address".into(),
            }],
            installation_params: vec![addr(0x77).to_string()],
        };
        let data = request.encoded_params().unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(abi::AbiDecoder::new(&data).address(0).unwrap(), addr(0x77));
    }

    #[test]
    fn encoded_params_reports_bad_value_by_name() {
        let request = InstallationRequest {
            dao: addr(1),
            plugin_repo: addr(2),
            version: VersionTag { release: 1, build: 1 },
            installation_abi: vec![MetadataAbiInput {
                name: "_data".into(),
                kind: "address".into(),
                internal_type: "address".into(),
                description: String::new(),
            }],
            installation_params: vec!["not-an-address".into()],
        };
        match request.encoded_params().unwrap_err() {
            InstallerError::InvalidInstallationParam { name, .. } => assert_eq!(name, "_data"),
            other => panic!("Expected InvalidInstallationParam, got {other:?}"),
        }
    }

    #[test]
    fn metadata_abi_input_reads_build_metadata_shape() {
        let json = r#"{"internalType":"address","name":"_data","type":"address","description":"parent contract address"}"#;
        let input: MetadataAbiInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.kind, "address");
        assert_eq!(input.internal_type, "address");
    }
}

//! Installation preparation through the plugin setup processor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::RpcError;
use crate::installation::{
    InstallationRequest, InstallationResult, MultiTargetPermission, VersionTag,
};
use crate::orchestrator::{StepSequence, TransactionFlow};
use crate::primitives::{Address, TxHash};
use crate::sdk::PluginInstaller;
use crate::sdk::abi::{self, AbiDecoder, Token};
use crate::sdk::rpc::RpcClient;

pub const PREPARE_INSTALLATION_SIGNATURE: &str =
    "prepareInstallation(address,(((uint8,uint16),address),bytes))";
pub const INSTALLATION_PREPARED_EVENT: &str = "InstallationPrepared(address,address,bytes32,address,(uint8,uint16),bytes,address,(address[],(uint8,address,address,address,bytes32)[]))";

pub fn prepare_installation_calldata(request: &InstallationRequest) -> Result<Vec<u8>> {
    let data = request.encoded_params()?;
    let params = Token::Tuple(vec![
        Token::Tuple(vec![
            Token::Tuple(vec![
                Token::Uint(request.version.release.into()),
                Token::Uint(request.version.build.into()),
            ]),
            Token::Address(request.plugin_repo),
        ]),
        Token::Bytes(data),
    ]);
    Ok(abi::encode_call(
        PREPARE_INSTALLATION_SIGNATURE,
        &[Token::Address(request.dao), params],
    ))
}

/// Decode the non-indexed part of `InstallationPrepared`.
pub fn decode_installation_prepared(
    data: &[u8],
    plugin_repo: Address,
) -> Result<InstallationResult> {
    let dec = AbiDecoder::new(data);
    let slot = |i| AbiDecoder::slot(0, i);

    let version = VersionTag {
        release: u8::try_from(dec.uint(slot(1))?).context("release out of range")?,
        build: u16::try_from(dec.uint(slot(2))?).context("build out of range")?,
    };
    let plugin_address = dec.address(slot(4))?;

    let setup = dec.follow(0, slot(5))?;
    let helpers_at = dec.follow(setup, AbiDecoder::slot(setup, 0))?;
    let permissions_at = dec.follow(setup, AbiDecoder::slot(setup, 1))?;

    let helpers = (0..dec.usize(helpers_at)?)
        .map(|i| dec.address(AbiDecoder::slot(helpers_at, i + 1)))
        .collect::<Result<Vec<_>>>()?;

    let permissions = (0..dec.usize(permissions_at)?)
        .map(|i| {
            let base = AbiDecoder::slot(permissions_at, 1 + 5 * i);
            Ok(MultiTargetPermission {
                operation: dec.uint(AbiDecoder::slot(base, 0))?.try_into()?,
                r#where: dec.address(AbiDecoder::slot(base, 1))?,
                who: dec.address(AbiDecoder::slot(base, 2))?,
                condition: dec.address(AbiDecoder::slot(base, 3))?,
                permission_id: dec.h256(AbiDecoder::slot(base, 4))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(InstallationResult {
        plugin_address,
        plugin_repo,
        version,
        helpers,
        permissions,
    })
}

struct PrepareInstallationFlow {
    rpc: Arc<RpcClient>,
    signer: Address,
    plugin_setup_processor: Address,
    plugin_repo: Address,
    calldata: Vec<u8>,
}

#[async_trait]
impl TransactionFlow for PrepareInstallationFlow {
    type Output = InstallationResult;

    async fn submit(&mut self) -> Result<TxHash> {
        self.rpc
            .send_transaction(self.signer, self.plugin_setup_processor, &self.calldata)
            .await
    }

    async fn confirm(&mut self, tx_hash: TxHash) -> Result<InstallationResult> {
        let receipt = self.rpc.wait_for_receipt(tx_hash).await?;
        let log = receipt
            .find_log(
                self.plugin_setup_processor,
                abi::event_topic(INSTALLATION_PREPARED_EVENT),
            )
            .ok_or(RpcError::MissingEvent {
                tx_hash,
                event: "InstallationPrepared",
            })?;
        decode_installation_prepared(&log.data_bytes()?, self.plugin_repo)
    }
}

/// `PluginInstaller` that talks to the plugin setup processor over JSON-RPC.
pub struct OnchainInstaller {
    rpc: Arc<RpcClient>,
    signer: Address,
    plugin_setup_processor: Address,
}

impl OnchainInstaller {
    pub fn new(rpc: Arc<RpcClient>, signer: Address, plugin_setup_processor: Address) -> Self {
        Self {
            rpc,
            signer,
            plugin_setup_processor,
        }
    }
}

impl PluginInstaller for OnchainInstaller {
    fn prepare_installation(
        &self,
        request: InstallationRequest,
    ) -> Result<StepSequence<InstallationResult>> {
        let calldata = prepare_installation_calldata(&request)?;
        Ok(StepSequence::new(
            "prepare installation",
            PrepareInstallationFlow {
                rpc: self.rpc.clone(),
                signer: self.signer,
                plugin_setup_processor: self.plugin_setup_processor,
                plugin_repo: request.plugin_repo,
                calldata,
            },
        ))
    }
}

//! Proposal creation on token-voting and multisig plugins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::dao::VotingMechanism;
use crate::errors::{InstallerError, RpcError};
use crate::orchestrator::{StepSequence, TransactionFlow};
use crate::primitives::{Address, TxHash};
use crate::proposal::{ExecutionParams, ProposalDraft, ProposalId, ProposalMetadata, ProposalResult};
use crate::sdk::GovernanceClient;
use crate::sdk::abi::{self, AbiDecoder, Token};
use crate::sdk::ipfs::IpfsPinner;
use crate::sdk::rpc::{RpcClient, TransactionReceipt};

pub const TOKEN_VOTING_CREATE_PROPOSAL: &str =
    "createProposal(bytes,(address,uint256,bytes)[],uint256,uint64,uint64,uint8,bool)";
pub const MULTISIG_CREATE_PROPOSAL: &str =
    "createProposal(bytes,(address,uint256,bytes)[],uint256,bool,bool,uint64,uint64)";
pub const PROPOSAL_CREATED_EVENT: &str =
    "ProposalCreated(uint256,address,uint64,uint64,bytes,(address,uint256,bytes)[],uint256)";

/// Calldata for `createProposal` on the plugin matching `draft.execution`.
pub fn create_proposal_calldata(metadata_uri: &str, draft: &ProposalDraft) -> Vec<u8> {
    let metadata = Token::Bytes(metadata_uri.as_bytes().to_vec());
    let actions = Token::Array(draft.actions.iter().map(|a| a.token()).collect());
    let allow_failure_map = Token::Uint(0);

    match draft.execution {
        ExecutionParams::TokenVoting {
            creator_vote,
            execute_on_pass,
            start,
            end,
        } => abi::encode_call(
            TOKEN_VOTING_CREATE_PROPOSAL,
            &[
                metadata,
                actions,
                allow_failure_map,
                Token::Uint(start.as_unix_seconds().into()),
                Token::Uint(end.as_unix_seconds().into()),
                Token::Uint(creator_vote as u128),
                Token::Bool(execute_on_pass),
            ],
        ),
        ExecutionParams::Multisig {
            approve,
            try_execution,
            start,
            end,
        } => abi::encode_call(
            MULTISIG_CREATE_PROPOSAL,
            &[
                metadata,
                actions,
                allow_failure_map,
                Token::Bool(approve),
                Token::Bool(try_execution),
                Token::Uint(start.as_unix_seconds().into()),
                Token::Uint(end.as_unix_seconds().into()),
            ],
        ),
    }
}

/// Read the proposal id from the `ProposalCreated` log `plugin` emitted.
/// The id is indexed, so it arrives as topic 1.
pub fn decode_proposal_created(
    receipt: &TransactionReceipt,
    plugin: Address,
) -> Result<ProposalResult> {
    let tx_hash = receipt.transaction_hash;
    let log = receipt
        .find_log(plugin, abi::event_topic(PROPOSAL_CREATED_EVENT))
        .ok_or(RpcError::MissingEvent {
            tx_hash,
            event: "ProposalCreated",
        })?;
    let id_topic = log
        .topics
        .get(1)
        .context("ProposalCreated log has no proposal id topic")?;
    let id = AbiDecoder::new(id_topic.as_bytes()).uint(0)?;

    Ok(ProposalResult {
        tx_hash,
        proposal_id: ProposalId::new(plugin, id),
    })
}

struct CreateProposalFlow {
    rpc: Arc<RpcClient>,
    signer: Address,
    plugin: Address,
    calldata: Vec<u8>,
}

#[async_trait]
impl TransactionFlow for CreateProposalFlow {
    type Output = ProposalResult;

    async fn submit(&mut self) -> Result<TxHash> {
        self.rpc
            .send_transaction(self.signer, self.plugin, &self.calldata)
            .await
    }

    async fn confirm(&mut self, tx_hash: TxHash) -> Result<ProposalResult> {
        let receipt = self.rpc.wait_for_receipt(tx_hash).await?;
        decode_proposal_created(&receipt, self.plugin)
    }
}

/// `GovernanceClient` for one voting mechanism, backed by JSON-RPC and IPFS.
pub struct GovernanceRpcClient {
    mechanism: VotingMechanism,
    rpc: Arc<RpcClient>,
    pinner: Arc<IpfsPinner>,
    signer: Address,
}

impl GovernanceRpcClient {
    pub fn new(
        mechanism: VotingMechanism,
        rpc: Arc<RpcClient>,
        pinner: Arc<IpfsPinner>,
        signer: Address,
    ) -> Self {
        Self {
            mechanism,
            rpc,
            pinner,
            signer,
        }
    }
}

#[async_trait]
impl GovernanceClient for GovernanceRpcClient {
    fn mechanism(&self) -> VotingMechanism {
        self.mechanism
    }

    async fn pin_metadata(&self, metadata: &ProposalMetadata) -> Result<String> {
        self.pinner.pin_json(metadata).await
    }

    fn create_proposal(
        &self,
        metadata_uri: String,
        draft: ProposalDraft,
    ) -> Result<StepSequence<ProposalResult>> {
        let draft_mechanism = draft.execution.mechanism();
        if draft_mechanism != self.mechanism {
            return Err(InstallerError::ProposalMechanismMismatch {
                client: self.mechanism,
                draft: draft_mechanism,
            }
            .into());
        }

        Ok(StepSequence::new(
            format!("{} proposal", self.mechanism),
            CreateProposalFlow {
                rpc: self.rpc.clone(),
                signer: self.signer,
                plugin: draft.plugin_address,
                calldata: create_proposal_calldata(&metadata_uri, &draft),
            },
        ))
    }
}

//! Typed error hierarchy for the installer.
//!
//! Three enums cover the three layers:
//! - `InstallerError`: failures raised by the orchestrator itself
//! - `StepError`: misuse of a two-step transaction sequence
//! - `RpcError`: JSON-RPC transport and transaction confirmation failures
//!
//! Anything else a collaborator returns travels as `anyhow::Error` untouched.

use thiserror::Error;

use crate::dao::VotingMechanism;
use crate::primitives::TxHash;

/// Errors raised directly by the installation orchestrator.
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("DAO not found: {address_or_name}")]
    DaoNotFound { address_or_name: String },

    #[error("Can not find the voting plugin on DAO {dao}")]
    VotingPluginNotFound { dao: String },

    #[error("{client} client cannot create a {draft} proposal")]
    ProposalMechanismMismatch {
        client: VotingMechanism,
        draft: VotingMechanism,
    },

    #[error("Invalid installation parameter '{name}': {message}")]
    InvalidInstallationParam { name: String, message: String },
}

/// Errors from driving a `StepSequence`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("{label}: sequence already confirmed, it cannot be advanced again")]
    Exhausted { label: String },

    #[error("{label}: a previous step failed, the sequence cannot be restarted")]
    Poisoned { label: String },

    #[error("{label}: expected the {expected} step")]
    UnexpectedStep {
        label: String,
        expected: &'static str,
    },
}

/// Errors from the JSON-RPC collaborator.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("RPC {method} returned error {code}: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },

    #[error("RPC {method} returned no result")]
    EmptyResult { method: String },

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("Transaction {tx_hash} not confirmed after {waited_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    #[error("Transaction {tx_hash} emitted no {event} event")]
    MissingEvent {
        tx_hash: TxHash,
        event: &'static str,
    },

    #[error("Node has no unlocked accounts and no signer is configured")]
    NoSigner,
}

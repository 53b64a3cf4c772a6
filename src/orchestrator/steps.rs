//! Two-step transaction sequences.
//!
//! Preparing an installation and creating a proposal both follow the same
//! exchange: submit a transaction, then wait for it to be mined and decode the
//! outcome. `StepSequence` drives a `TransactionFlow` through
//! `Ready → Submitted → Confirmed`, one `advance()` per step. A failed step
//! poisons the sequence; it is never restarted.

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::StepError;
use crate::primitives::TxHash;

/// The two halves of an on-chain exchange.
#[async_trait]
pub trait TransactionFlow: Send {
    type Output: Send;

    /// Send the transaction and return its hash without waiting for it.
    async fn submit(&mut self) -> Result<TxHash>;

    /// Block until `tx_hash` is confirmed and decode the result.
    async fn confirm(&mut self, tx_hash: TxHash) -> Result<Self::Output>;
}

/// Value produced by one `advance()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Submitted(TxHash),
    Confirmed(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Ready,
    Submitted(TxHash),
    Confirmed,
    Poisoned,
}

pub struct StepSequence<T> {
    label: String,
    flow: Box<dyn TransactionFlow<Output = T>>,
    state: StepState,
}

impl<T: Send> StepSequence<T> {
    pub fn new(label: impl Into<String>, flow: impl TransactionFlow<Output = T> + 'static) -> Self {
        Self {
            label: label.into(),
            flow: Box::new(flow),
            state: StepState::Ready,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Run the next step.
    ///
    /// Errors from the flow are returned as-is and leave the sequence
    /// poisoned; calling again after `Confirmed` is a `StepError`.
    pub async fn advance(&mut self) -> Result<Step<T>> {
        match self.state {
            StepState::Ready => match self.flow.submit().await {
                Ok(hash) => {
                    self.state = StepState::Submitted(hash);
                    Ok(Step::Submitted(hash))
                }
                Err(e) => {
                    self.state = StepState::Poisoned;
                    Err(e)
                }
            },
            StepState::Submitted(hash) => match self.flow.confirm(hash).await {
                Ok(output) => {
                    self.state = StepState::Confirmed;
                    Ok(Step::Confirmed(output))
                }
                Err(e) => {
                    self.state = StepState::Poisoned;
                    Err(e)
                }
            },
            StepState::Confirmed => Err(StepError::Exhausted {
                label: self.label.clone(),
            }
            .into()),
            StepState::Poisoned => Err(StepError::Poisoned {
                label: self.label.clone(),
            }
            .into()),
        }
    }

    /// Advance and require the submission step.
    pub async fn submitted(&mut self) -> Result<TxHash> {
        match self.advance().await? {
            Step::Submitted(hash) => Ok(hash),
            Step::Confirmed(_) => Err(self.unexpected("submission")),
        }
    }

    /// Advance and require the confirmation step.
    pub async fn confirmed(&mut self) -> Result<T> {
        match self.advance().await? {
            Step::Confirmed(output) => Ok(output),
            Step::Submitted(_) => Err(self.unexpected("confirmation")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> anyhow::Error {
        StepError::UnexpectedStep {
            label: self.label.clone(),
            expected,
        }
        .into()
    }
}

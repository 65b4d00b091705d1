//! Two-phase proof submission: dry-run, send, confirm.

use alloy::primitives::TxHash;
use price_discrepancy_lib::CalldataArgs;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{ChainError, TxReceiptSummary, VerifierChain, UNKNOWN_REVERT_REASON};
use crate::config::SubmitConfig;
use crate::error::{PipelineError, Stage};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RejectReason {
    NetworkMismatch { expected: u64, actual: u64 },
    Declined { message: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NetworkMismatch { expected, actual } => {
                write!(f, "network mismatch: connected to {actual}, expected {expected}")
            }
            RejectReason::Declined { message } => f.write_str(message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SubmissionOutcome {
    /// Broadcast, not yet included. Only ever reported as progress.
    Pending { tx_hash: TxHash },
    Confirmed { tx_hash: TxHash, receipt: TxReceiptSummary },
    Reverted { tx_hash: TxHash, reason: String },
    Rejected { reason: RejectReason },
}

impl SubmissionOutcome {
    /// Collapse into success-with-receipt or a classified error.
    pub fn into_result(self) -> Result<TxReceiptSummary, PipelineError> {
        match self {
            SubmissionOutcome::Confirmed { receipt, .. } => Ok(receipt),
            SubmissionOutcome::Reverted { tx_hash, reason } => {
                Err(PipelineError::Reverted { tx_hash, reason })
            }
            SubmissionOutcome::Rejected {
                reason: RejectReason::NetworkMismatch { expected, actual },
            } => Err(PipelineError::NetworkMismatch { expected, actual }),
            SubmissionOutcome::Rejected {
                reason: RejectReason::Declined { message },
            } => Err(PipelineError::Rejected(message)),
            SubmissionOutcome::Pending { tx_hash } => Err(PipelineError::Unknown {
                stage: Stage::Submission,
                message: format!("transaction {tx_hash} is still pending"),
            }),
        }
    }
}

/// Failures the submitter does not classify: lost connections, timeouts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("{0}")]
    Transport(String),
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        PipelineError::Unknown {
            stage: Stage::Submission,
            message: err.to_string(),
        }
    }
}

pub struct Submitter<C> {
    chain: C,
    expected_chain_id: u64,
    gas_limit: u64,
}

impl<C: VerifierChain> Submitter<C> {
    pub fn new(chain: C, config: &SubmitConfig) -> Self {
        Self {
            chain,
            expected_chain_id: config.expected_chain_id,
            gas_limit: config.gas_limit,
        }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub async fn submit(&self, args: &CalldataArgs) -> Result<SubmissionOutcome, SubmitError> {
        self.submit_with_progress(args, |_| {}).await
    }

    /// Run the submission, calling `progress` with `Pending` once the
    /// transaction hash is known.
    pub async fn submit_with_progress(
        &self,
        args: &CalldataArgs,
        mut progress: impl FnMut(&SubmissionOutcome) + Send,
    ) -> Result<SubmissionOutcome, SubmitError> {
        // 1. Network guard
        let actual = self.chain.chain_id().await.map_err(transport)?;
        if actual != self.expected_chain_id {
            warn!(expected = self.expected_chain_id, actual, "wrong network, not sending");
            return Ok(SubmissionOutcome::Rejected {
                reason: RejectReason::NetworkMismatch {
                    expected: self.expected_chain_id,
                    actual,
                },
            });
        }

        // 2. Simulate; a failure here is only a warning
        match self.chain.simulate(args, None).await {
            Ok(()) => info!("simulation passed"),
            Err(e) => warn!(error = %e, "simulation failed, sending anyway"),
        }

        // 3. Send with a fixed gas ceiling
        let tx_hash = match self.chain.broadcast(args, self.gas_limit).await {
            Ok(hash) => hash,
            Err(ChainError::Rejected(message)) | Err(ChainError::Reverted(message)) => {
                warn!(%message, "submission rejected");
                return Ok(SubmissionOutcome::Rejected {
                    reason: RejectReason::Declined { message },
                });
            }
            Err(ChainError::Transport(message)) => return Err(SubmitError::Transport(message)),
        };
        info!(%tx_hash, gas_limit = self.gas_limit, "transaction sent");
        progress(&SubmissionOutcome::Pending { tx_hash });

        // 4. Confirm
        let receipt = self.chain.confirm(tx_hash).await.map_err(transport)?;
        if receipt.success {
            info!(%tx_hash, block = ?receipt.block_number, gas_used = receipt.gas_used, "confirmed");
            return Ok(SubmissionOutcome::Confirmed { tx_hash, receipt });
        }

        // 5. Replay at the inclusion block for the revert reason
        let reason = match self.chain.simulate(args, receipt.block_number).await {
            Err(ChainError::Reverted(reason)) if !reason.is_empty() => reason,
            _ => UNKNOWN_REVERT_REASON.to_string(),
        };
        warn!(%tx_hash, %reason, "transaction reverted");
        Ok(SubmissionOutcome::Reverted { tx_hash, reason })
    }
}

fn transport(err: ChainError) -> SubmitError {
    SubmitError::Transport(err.to_string())
}

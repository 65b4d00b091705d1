//! Classified failures at the request and submission boundary.
//!
//! Every error that leaves the pipeline is a [`PipelineError`]; its
//! [`Stage`] tells the caller whether to fix inputs, fix the deployment,
//! switch networks, or give up.

use alloy::primitives::TxHash;
use price_discrepancy_lib::{GateError, NormalizeError, ParseError, ScaleError, SnapshotError};
use serde::Serialize;
use thiserror::Error;

use crate::prices::PriceReadError;
use crate::proving::ProofError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Validation,
    Proving,
    Parsing,
    NetworkCheck,
    Submission,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Proving => "proving",
            Stage::Parsing => "parsing",
            Stage::NetworkCheck => "network-check",
            Stage::Submission => "submission",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Non-numeric or missing request fields; the prover is never reached.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pool read failed; no substitute price is used.
    #[error("price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("threshold not met: {0}")]
    ThresholdNotMet(#[from] GateError),

    #[error("input out of circuit range: {0}")]
    OutOfRange(#[from] ScaleError),

    /// Proving key, witness program, or prover executable is absent.
    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    /// The prover ran and produced nothing usable.
    #[error("prover failure: {0}")]
    ProverFailure(String),

    #[error("a proof request is already in flight")]
    ProverBusy,

    /// The export blob did not have the expected two-array shape.
    #[error("calldata parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("connected to chain {actual}, expected chain {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// The transaction never reached the chain.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The verifier reverted on-chain.
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: TxHash, reason: String },

    #[error("unknown error: {message}")]
    Unknown { stage: Stage, message: String },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidInput(_)
            | PipelineError::PriceUnavailable(_)
            | PipelineError::ThresholdNotMet(_)
            | PipelineError::OutOfRange(_) => Stage::Validation,
            PipelineError::MissingArtifact(_)
            | PipelineError::ProverFailure(_)
            | PipelineError::ProverBusy => Stage::Proving,
            PipelineError::Parse(_) => Stage::Parsing,
            PipelineError::NetworkMismatch { .. } => Stage::NetworkCheck,
            PipelineError::Rejected(_) | PipelineError::Reverted { .. } => Stage::Submission,
            PipelineError::Unknown { stage, .. } => *stage,
        }
    }

    /// The single-field description handed across the boundary.
    pub fn describe(&self) -> String {
        format!("{}: {}", self.stage(), self)
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.describe(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<NormalizeError> for PipelineError {
    fn from(err: NormalizeError) -> Self {
        PipelineError::PriceUnavailable(err.to_string())
    }
}

impl From<SnapshotError> for PipelineError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Normalize(e) => e.into(),
            SnapshotError::Scale(e) => e.into(),
        }
    }
}

impl From<PriceReadError> for PipelineError {
    fn from(err: PriceReadError) -> Self {
        PipelineError::PriceUnavailable(err.to_string())
    }
}

impl From<ProofError> for PipelineError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::MissingArtifact(msg) => PipelineError::MissingArtifact(msg),
            ProofError::ProverFailure(msg) => PipelineError::ProverFailure(msg),
            ProofError::Busy => PipelineError::ProverBusy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_every_error_names_its_stage() {
        let cases = [
            (PipelineError::InvalidInput("price1 missing".into()), "validation"),
            (PipelineError::PriceUnavailable("rpc down".into()), "validation"),
            (PipelineError::from(GateError::ZeroThreshold), "validation"),
            (PipelineError::from(ScaleError::ZeroScalingFactor), "validation"),
            (PipelineError::MissingArtifact("zkey".into()), "proving"),
            (PipelineError::ProverFailure("exit 1".into()), "proving"),
            (PipelineError::ProverBusy, "proving"),
            (PipelineError::from(ParseError::MissingBoundary), "parsing"),
            (
                PipelineError::NetworkMismatch {
                    expected: 84532,
                    actual: 1,
                },
                "network-check",
            ),
            (PipelineError::Rejected("user denied".into()), "submission"),
            (
                PipelineError::Reverted {
                    tx_hash: TxHash::ZERO,
                    reason: "bad proof".into(),
                },
                "submission",
            ),
            (
                PipelineError::Unknown {
                    stage: Stage::Submission,
                    message: "timeout".into(),
                },
                "submission",
            ),
        ];
        for (err, stage) in cases {
            assert_eq!(err.stage().to_string(), stage);
            assert!(err.describe().starts_with(&format!("{stage}: ")), "{}", err.describe());
        }
    }

    #[test]
    fn test_proof_errors_keep_their_class() {
        assert_eq!(
            PipelineError::from(ProofError::MissingArtifact("wasm".into())),
            PipelineError::MissingArtifact("wasm".into())
        );
        assert_eq!(
            PipelineError::from(ProofError::ProverFailure("boom".into())),
            PipelineError::ProverFailure("boom".into())
        );
        assert_eq!(PipelineError::from(ProofError::Busy), PipelineError::ProverBusy);
    }

    #[test]
    fn test_snapshot_errors_keep_their_class() {
        assert_eq!(
            PipelineError::from(SnapshotError::Scale(ScaleError::ZeroScalingFactor)),
            PipelineError::OutOfRange(ScaleError::ZeroScalingFactor)
        );
        assert!(matches!(
            PipelineError::from(SnapshotError::Normalize(NormalizeError::Uninitialized)),
            PipelineError::PriceUnavailable(_)
        ));
    }

    #[test]
    fn test_error_body_shape() {
        let err = PipelineError::from(GateError::BelowThreshold {
            difference: U256::from(10u64),
            threshold: 15,
        });
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "validation: threshold not met: price difference 10 is below the threshold 15"
            })
        );
    }
}

//! Host side of the price-discrepancy proof pipeline: pool reads, the external
//! prover, verifier submission and the HTTP request operation.

pub mod chain;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prices;
pub mod proving;
pub mod server;
pub mod submitter;

pub use chain::{AlloyVerifierChain, ChainError, TxReceiptSummary, VerifierChain};
pub use config::{PipelineConfig, PoolConfig, ProverConfig, SubmitConfig};
pub use error::{ErrorBody, PipelineError, Stage};
pub use pipeline::{validate, ProofRequest, ProofResponse, ProofService, ValidatedRequest};
pub use prices::{fetch_snapshot, read_slot0, PriceReadError};
pub use proving::{ProofBundle, ProofError, ProofRequester, Prover, ProverOutput, SnarkjsProver};
pub use submitter::{RejectReason, SubmissionOutcome, SubmitError, Submitter};

use tracing_subscriber::EnvFilter;

/// Install the `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, nested binaries) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

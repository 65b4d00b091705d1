//! Proof generation through an external prover.
//!
//! The circuit and its proving system are opaque: a [`Prover`] takes the three
//! scaled inputs and hands back `{proof, publicSignals}`, and it can export a
//! proof as Solidity calldata text. [`SnarkjsProver`] drives the snarkjs CLI
//! against a compiled witness program and proving key.

use price_discrepancy_lib::{promote_all, CalldataArgs, ScaledInput};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::ProverConfig;
use crate::error::PipelineError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// A required file or executable is absent; needs operator action.
    #[error("{0}")]
    MissingArtifact(String),

    /// The prover ran but produced no usable proof.
    #[error("{0}")]
    ProverFailure(String),

    #[error("a proof request is already in flight")]
    Busy,
}

/// What a prover hands back, before validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProverOutput {
    pub proof: serde_json::Value,
    pub public_signals: Vec<String>,
}

pub trait Prover: Send + Sync {
    /// Run witness generation and proving for `{price1, price2, threshold}`.
    fn full_prove(
        &self,
        input: &ScaledInput,
    ) -> impl Future<Output = Result<ProverOutput, ProofError>> + Send;

    /// Render a proof as the verifier's Solidity calldata text.
    fn export_calldata(
        &self,
        output: &ProverOutput,
    ) -> impl Future<Output = Result<String, ProofError>> + Send;
}

// =============================================================================
//                              PROOF BUNDLE
// =============================================================================

/// A proof together with its public signals. Only constructible when both are
/// present, so a half-populated result cannot exist.
#[derive(Clone, Debug, PartialEq)]
pub struct ProofBundle {
    output: ProverOutput,
}

impl ProofBundle {
    pub fn new(output: ProverOutput) -> Result<Self, ProofError> {
        let proof_present = match &output.proof {
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => false,
        };
        if !proof_present {
            return Err(ProofError::ProverFailure(
                "prover returned no proof object".into(),
            ));
        }
        if output.public_signals.is_empty() {
            return Err(ProofError::ProverFailure(
                "prover returned no public signals".into(),
            ));
        }
        promote_all(&output.public_signals)
            .map_err(|e| ProofError::ProverFailure(format!("malformed public signal: {e}")))?;
        Ok(Self { output })
    }

    pub fn proof(&self) -> &serde_json::Value {
        &self.output.proof
    }

    pub fn public_signals(&self) -> &[String] {
        &self.output.public_signals
    }

    pub fn output(&self) -> &ProverOutput {
        &self.output
    }
}

// =============================================================================
//                             PROOF REQUESTER
// =============================================================================

/// Front door to a [`Prover`]: at most one proof in flight, validated output,
/// and calldata formatting.
pub struct ProofRequester<P> {
    prover: P,
    in_flight: Semaphore,
}

impl<P: Prover> ProofRequester<P> {
    pub fn new(prover: P) -> Self {
        Self {
            prover,
            in_flight: Semaphore::new(1),
        }
    }

    pub fn prover(&self) -> &P {
        &self.prover
    }

    /// Prove once. A concurrent call fails with [`ProofError::Busy`] rather than
    /// queueing a duplicate proof; nothing is retried here.
    pub async fn request_proof(&self, input: &ScaledInput) -> Result<ProofBundle, ProofError> {
        let _permit = self.in_flight.try_acquire().map_err(|_| ProofError::Busy)?;
        info!(
            price1 = input.price1,
            price2 = input.price2,
            threshold = input.threshold,
            "requesting proof"
        );
        let output = self.prover.full_prove(input).await?;
        let bundle = ProofBundle::new(output)?;
        info!(signals = bundle.public_signals().len(), "proof generated");
        Ok(bundle)
    }

    /// Export the bundle and parse the blob into verifier arguments.
    pub async fn format_calldata(&self, bundle: &ProofBundle) -> Result<CalldataArgs, PipelineError> {
        let blob = self.prover.export_calldata(bundle.output()).await?;
        debug!(%blob, "calldata export");
        let args = CalldataArgs::from_export(&blob, bundle.public_signals())?;
        Ok(args)
    }
}

// =============================================================================
//                             SNARKJS PROVER
// =============================================================================

/// Runs `snarkjs plonk fullprove` and `snarkjs zkey export soliditycalldata`.
#[derive(Clone, Debug)]
pub struct SnarkjsProver {
    wasm_path: PathBuf,
    zkey_path: PathBuf,
    program: String,
    leading_args: Vec<String>,
}

impl SnarkjsProver {
    pub fn new(config: &ProverConfig) -> Self {
        let mut parts = config.snarkjs_bin.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "snarkjs".to_string());
        Self {
            wasm_path: config.wasm_path.clone(),
            zkey_path: config.zkey_path.clone(),
            program,
            leading_args: parts.collect(),
        }
    }

    /// Both artifacts must exist before the prover is started.
    pub fn check_artifacts(&self) -> Result<(), ProofError> {
        for (kind, path) in [("witness program", &self.wasm_path), ("proving key", &self.zkey_path)] {
            if !path.is_file() {
                return Err(ProofError::MissingArtifact(format!(
                    "{kind} not found at {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    async fn run(&self, args: &[&Path]) -> Result<String, ProofError> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProofError::MissingArtifact(format!("prover executable '{}' not found", self.program))
                } else {
                    ProofError::ProverFailure(format!("failed to start '{}': {e}", self.program))
                }
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(ProofError::ProverFailure(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                last_line(&stderr).or_else(|| last_line(&stdout)).unwrap_or("no output")
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

fn work_dir() -> Result<tempfile::TempDir, ProofError> {
    tempfile::Builder::new()
        .prefix("price-discrepancy-")
        .tempdir()
        .map_err(|e| ProofError::ProverFailure(format!("failed to create work dir: {e}")))
}

async fn write_json(path: &Path, value: &impl Serialize) -> Result<(), ProofError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ProofError::ProverFailure(format!("failed to encode {}: {e}", path.display())))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ProofError::ProverFailure(format!("failed to write {}: {e}", path.display())))
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ProofError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProofError::ProverFailure(format!("prover left no {}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProofError::ProverFailure(format!("malformed {}: {e}", path.display())))
}

impl Prover for SnarkjsProver {
    async fn full_prove(&self, input: &ScaledInput) -> Result<ProverOutput, ProofError> {
        self.check_artifacts()?;
        let dir = work_dir()?;
        let input_path = dir.path().join("input.json");
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");

        write_json(&input_path, &input.circuit_inputs()).await?;
        info!(wasm = %self.wasm_path.display(), zkey = %self.zkey_path.display(), "running snarkjs plonk fullprove");
        self.run(&[
            Path::new("plonk"),
            Path::new("fullprove"),
            input_path.as_path(),
            self.wasm_path.as_path(),
            self.zkey_path.as_path(),
            proof_path.as_path(),
            public_path.as_path(),
        ])
        .await?;

        Ok(ProverOutput {
            proof: read_json(&proof_path).await?,
            public_signals: read_json(&public_path).await?,
        })
    }

    async fn export_calldata(&self, output: &ProverOutput) -> Result<String, ProofError> {
        let dir = work_dir()?;
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");
        write_json(&proof_path, &output.proof).await?;
        write_json(&public_path, &output.public_signals).await?;

        let blob = self
            .run(&[
                Path::new("zkey"),
                Path::new("export"),
                Path::new("soliditycalldata"),
                public_path.as_path(),
                proof_path.as_path(),
            ])
            .await?;
        Ok(blob.trim().to_string())
    }
}

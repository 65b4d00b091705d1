//! The request operation: `{price1, price2, threshold}` in, verifier arguments
//! out.

use alloy::primitives::U256;
use price_discrepancy_lib::{scale_inputs, CalldataArgs, NormalizedPrice, ScaledInput, ScalingConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::PipelineError;
use crate::proving::{ProofBundle, ProofRequester, Prover};

/// Request body. Each field may be a decimal string or a JSON integer; absent
/// fields are reported rather than defaulted.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ProofRequest {
    pub price1: Option<Value>,
    pub price2: Option<Value>,
    pub threshold: Option<Value>,
}

impl ProofRequest {
    pub fn new(price1: impl ToString, price2: impl ToString, threshold: impl ToString) -> Self {
        Self {
            price1: Some(Value::String(price1.to_string())),
            price2: Some(Value::String(price2.to_string())),
            threshold: Some(Value::String(threshold.to_string())),
        }
    }
}

/// A request whose fields are known to be integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub price1: NormalizedPrice,
    pub price2: NormalizedPrice,
    pub threshold: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    pub proof: Vec<U256>,
    pub public_signals: Vec<U256>,
}

impl From<CalldataArgs> for ProofResponse {
    fn from(args: CalldataArgs) -> Self {
        Self {
            proof: args.proof_args,
            public_signals: args.signal_args,
        }
    }
}

impl From<ProofResponse> for CalldataArgs {
    fn from(response: ProofResponse) -> Self {
        Self {
            proof_args: response.proof,
            signal_args: response.public_signals,
        }
    }
}

fn integer_field(name: &str, value: Option<&Value>) -> Result<U256, PipelineError> {
    let invalid = |detail: &str| PipelineError::InvalidInput(format!("{name} {detail}"));
    match value {
        None | Some(Value::Null) => Err(invalid("is missing")),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(&format!("is not a non-negative integer: '{s}'")));
            }
            U256::from_str_radix(s, 10).map_err(|_| invalid("does not fit in 256 bits"))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| invalid(&format!("is not a non-negative integer: {n}"))),
        Some(other) => Err(invalid(&format!("has the wrong type: {other}"))),
    }
}

/// Reject non-numeric or missing fields before anything is proved.
pub fn validate(request: &ProofRequest) -> Result<ValidatedRequest, PipelineError> {
    let price1 = integer_field("price1", request.price1.as_ref())?;
    let price2 = integer_field("price2", request.price2.as_ref())?;
    let threshold = integer_field("threshold", request.threshold.as_ref())?;
    let threshold = u64::try_from(threshold)
        .map_err(|_| PipelineError::InvalidInput(format!("threshold {threshold} is too large")))?;
    Ok(ValidatedRequest {
        price1: NormalizedPrice(price1),
        price2: NormalizedPrice(price2),
        threshold,
    })
}

/// Validate, scale, prove, format. Owns the prover so concurrent callers share
/// its at-most-one-in-flight guard.
pub struct ProofService<P> {
    requester: ProofRequester<P>,
    scaling: ScalingConfig,
}

impl<P: Prover> ProofService<P> {
    pub fn new(prover: P, scaling: ScalingConfig) -> Self {
        Self {
            requester: ProofRequester::new(prover),
            scaling,
        }
    }

    pub fn requester(&self) -> &ProofRequester<P> {
        &self.requester
    }

    pub fn scaling(&self) -> &ScalingConfig {
        &self.scaling
    }

    pub async fn handle(&self, request: &ProofRequest) -> Result<ProofResponse, PipelineError> {
        let validated = validate(request)?;
        self.prove(&validated).await.map(ProofResponse::from)
    }

    /// Scale and prove an already validated request.
    pub async fn prove(&self, request: &ValidatedRequest) -> Result<CalldataArgs, PipelineError> {
        let input = scale_inputs(request.price1, request.price2, request.threshold, &self.scaling)?;
        let (_, args) = self.prove_scaled(&input).await?;
        Ok(args)
    }

    pub async fn prove_scaled(
        &self,
        input: &ScaledInput,
    ) -> Result<(ProofBundle, CalldataArgs), PipelineError> {
        info!(?input, "scaled circuit inputs");
        let bundle = self.requester.request_proof(input).await?;
        let args = self.requester.format_calldata(&bundle).await?;
        info!(
            proof_elements = args.proof_args.len(),
            signals = args.signal_args.len(),
            "calldata formatted"
        );
        Ok((bundle, args))
    }
}

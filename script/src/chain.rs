//! Verifier contract access.
//!
//! [`VerifierChain`] is the seam between the submitter and a live chain: chain
//! id, a static-call simulation, a gas-capped broadcast and a receipt wait.
//! [`AlloyVerifierChain`] implements it over an alloy provider with a local
//! signer.

use alloy::{
    eips::BlockId,
    network::ReceiptResponse,
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
    sol_types::decode_revert_reason,
    transports::RpcError,
};
use anyhow::{Context, Result};
use price_discrepancy_lib::{CalldataArgs, PLONK_PROOF_ELEMENTS};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

use crate::config::SubmitConfig;

sol! {
    #[sol(rpc)]
    interface IPriceDiscrepancy {
        function submitProof(uint256[24] calldata proof, uint256[] calldata pubSignals) external;
    }
}

pub const UNKNOWN_REVERT_REASON: &str = "unknown revert reason";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Never reached the chain: signing declined, node refused, malformed call.
    #[error("{0}")]
    Rejected(String),

    /// The verifier reverted (static call or mined transaction).
    #[error("{0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// The parts of a receipt the caller gets back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

pub trait VerifierChain: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Static call of `submitProof`; at `block` when given, otherwise latest.
    fn simulate(
        &self,
        args: &CalldataArgs,
        block: Option<u64>,
    ) -> impl Future<Output = Result<(), ChainError>> + Send;

    /// Sign and send `submitProof` with a fixed gas limit.
    fn broadcast(
        &self,
        args: &CalldataArgs,
        gas_limit: u64,
    ) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Wait for the transaction to be included.
    fn confirm(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TxReceiptSummary, ChainError>> + Send;
}

/// The proof as the verifier's `uint256[24]`; any other length is a malformed
/// call and never leaves the process.
pub fn proof_words(args: &CalldataArgs) -> Result<[U256; PLONK_PROOF_ELEMENTS], ChainError> {
    args.plonk_proof().ok_or_else(|| {
        ChainError::Rejected(format!(
            "verifier expects {PLONK_PROOF_ELEMENTS} proof elements, got {}",
            args.proof_args.len()
        ))
    })
}

/// JSON-RPC code 3, or the geth-style message, marks an EVM revert. Anything
/// else from the node (rate limits, pruned state) is not the verifier's answer.
fn is_execution_revert(code: i64, message: &str) -> bool {
    code == 3 || message.to_ascii_lowercase().contains("execution reverted")
}

fn revert_reason(err: &alloy::contract::Error) -> Option<String> {
    let data = err.as_revert_data()?;
    Some(decode_revert_reason(&data).unwrap_or_else(|| format!("custom error {data}")))
}

// =============================================================================
//                             ALLOY BACKEND
// =============================================================================

pub struct AlloyVerifierChain {
    provider: DynProvider,
    verifier: Address,
    from: Address,
}

impl AlloyVerifierChain {
    /// Build a signing provider for `config.rpc_url`.
    pub fn connect(config: &SubmitConfig, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.parse().context("PRIVATE_KEY is not a valid key")?;
        let from = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(signer)
            .connect_http(config.rpc_url.parse().context("RPC_URL is not a valid url")?)
            .erased();
        Ok(Self {
            provider,
            verifier: config.verifier_address,
            from,
        })
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    fn contract(&self) -> IPriceDiscrepancy::IPriceDiscrepancyInstance<&DynProvider> {
        IPriceDiscrepancy::new(self.verifier, &self.provider)
    }
}

impl VerifierChain for AlloyVerifierChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))
    }

    async fn simulate(&self, args: &CalldataArgs, block: Option<u64>) -> Result<(), ChainError> {
        let proof = proof_words(args)?;
        let contract = self.contract();
        let mut call = contract
            .submitProof(proof, args.signal_args.clone())
            .from(self.from);
        if let Some(number) = block {
            call = call.block(BlockId::number(number));
        }
        match call.call().await {
            Ok(_) => Ok(()),
            Err(e) => match &e {
                alloy::contract::Error::TransportError(RpcError::ErrorResp(payload))
                    if is_execution_revert(payload.code, &payload.message) =>
                {
                    let reason = revert_reason(&e).unwrap_or_else(|| payload.message.to_string());
                    Err(ChainError::Reverted(reason))
                }
                _ => Err(ChainError::Transport(e.to_string())),
            },
        }
    }

    async fn broadcast(&self, args: &CalldataArgs, gas_limit: u64) -> Result<TxHash, ChainError> {
        let proof = proof_words(args)?;
        let contract = self.contract();
        let pending = contract
            .submitProof(proof, args.signal_args.clone())
            .gas(gas_limit)
            .send()
            .await
            .map_err(|e| match e {
                alloy::contract::Error::TransportError(RpcError::ErrorResp(payload)) => {
                    ChainError::Rejected(payload.message.to_string())
                }
                alloy::contract::Error::TransportError(RpcError::LocalUsageError(err)) => {
                    ChainError::Rejected(err.to_string())
                }
                other => ChainError::Transport(other.to_string()),
            })?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "broadcast");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<TxReceiptSummary, ChainError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(TxReceiptSummary {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
            success: receipt.status(),
        })
    }
}

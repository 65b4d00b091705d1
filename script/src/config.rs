//! Pipeline configuration.
//!
//! Everything the pipeline would otherwise treat as an ambient constant
//! (addresses, chain id, scaling, artifact paths) lives in one immutable
//! [`PipelineConfig`] that callers build once and pass in.
//!
//! Environment variables (all optional, defaults target Base Sepolia):
//!   SCALING_FACTOR, CIRCUIT_INPUT_BITS
//!   WASM_PATH, ZKEY_PATH, SNARKJS_BIN
//!   RPC_URL, VERIFIER_ADDRESS, EXPECTED_CHAIN_ID, GAS_LIMIT
//!   POOL_A_* / POOL_B_*: RPC_URL, ADDRESS, ORIENTATION, DECIMALS_ADJUSTMENT
//!   OUTPUT_DECIMALS

use alloy::primitives::{address, Address};
use anyhow::{Context, Result};
use price_discrepancy_lib::{Orientation, PriceFormula, ScalingConfig};
use std::path::PathBuf;
use std::str::FromStr;

pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// Price-discrepancy proxy on Base Sepolia.
pub const DEFAULT_VERIFIER_ADDRESS: Address = address!("71dd6c37bb9162eeb704033938cb72c1ed7e612a");

/// USDC/WETH pool on Ethereum mainnet (token0 = USDC).
pub const MAINNET_POOL_ADDRESS: Address = address!("E0554a476A092703abdB3Ef35c80e0D76d32939F");

/// WETH/USDC pool on Base (token0 = WETH).
pub const BASE_POOL_ADDRESS: Address = address!("d0b53D9277642d899DF5C87A3966A349A798F224");

/// Fixed gas ceiling for the verifier call; estimation is unreliable there.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

pub const DEFAULT_OUTPUT_DECIMALS: u32 = 18;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub label: String,
    pub rpc_url: String,
    pub address: Address,
    pub formula: PriceFormula,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProverConfig {
    /// Compiled witness generator (`.wasm`).
    pub wasm_path: PathBuf,
    /// Proving key (`.zkey`).
    pub zkey_path: PathBuf,
    /// Command used to run snarkjs; may carry leading arguments (`npx snarkjs`).
    pub snarkjs_bin: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitConfig {
    pub rpc_url: String,
    pub verifier_address: Address,
    pub expected_chain_id: u64,
    pub gas_limit: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub scaling: ScalingConfig,
    pub pools: [PoolConfig; 2],
    pub prover: ProverConfig,
    pub submit: SubmitConfig,
}

fn var_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{key} is invalid: '{raw}'")),
        None => Ok(default),
    }
}

fn pool_from_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    prefix: &str,
    label: &str,
    defaults: (&str, Address, Orientation, i32),
    output_decimals: u32,
) -> Result<PoolConfig> {
    let (rpc_url, address, orientation, adjustment) = defaults;
    Ok(PoolConfig {
        label: label.to_string(),
        rpc_url: var_or(lookup, &format!("{prefix}_RPC_URL"), rpc_url.to_string())?,
        address: var_or(lookup, &format!("{prefix}_ADDRESS"), address)?,
        formula: PriceFormula {
            orientation: var_or(lookup, &format!("{prefix}_ORIENTATION"), orientation)?,
            decimals_adjustment: var_or(
                lookup,
                &format!("{prefix}_DECIMALS_ADJUSTMENT"),
                adjustment,
            )?,
            output_decimals,
        },
    })
}

impl PipelineConfig {
    /// Build the configuration from `lookup`, falling back to the defaults for
    /// every key it does not answer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let output_decimals = var_or(&lookup, "OUTPUT_DECIMALS", DEFAULT_OUTPUT_DECIMALS)?;
        let scaling = ScalingConfig {
            scaling_factor: var_or(
                &lookup,
                "SCALING_FACTOR",
                ScalingConfig::default().scaling_factor,
            )?,
            circuit_input_bits: var_or(
                &lookup,
                "CIRCUIT_INPUT_BITS",
                ScalingConfig::default().circuit_input_bits,
            )?,
        };
        anyhow::ensure!(scaling.scaling_factor > 0, "SCALING_FACTOR must be non-zero");

        let pools = [
            pool_from_lookup(
                &lookup,
                "POOL_A",
                "mainnet",
                (
                    "https://eth.merkle.io",
                    MAINNET_POOL_ADDRESS,
                    Orientation::QuotePerBase,
                    -12,
                ),
                output_decimals,
            )?,
            pool_from_lookup(
                &lookup,
                "POOL_B",
                "base",
                (
                    "https://mainnet.base.org",
                    BASE_POOL_ADDRESS,
                    Orientation::BasePerQuote,
                    12,
                ),
                output_decimals,
            )?,
        ];

        let prover = ProverConfig {
            wasm_path: var_or(
                &lookup,
                "WASM_PATH",
                PathBuf::from("circuits/build/price_discrepancy_js/price_discrepancy.wasm"),
            )?,
            zkey_path: var_or(
                &lookup,
                "ZKEY_PATH",
                PathBuf::from("circuits/build/proving_key.zkey"),
            )?,
            snarkjs_bin: var_or(&lookup, "SNARKJS_BIN", "snarkjs".to_string())?,
        };

        let submit = SubmitConfig {
            rpc_url: var_or(&lookup, "RPC_URL", "https://sepolia.base.org".to_string())?,
            verifier_address: var_or(&lookup, "VERIFIER_ADDRESS", DEFAULT_VERIFIER_ADDRESS)?,
            expected_chain_id: var_or(&lookup, "EXPECTED_CHAIN_ID", BASE_SEPOLIA_CHAIN_ID)?,
            gas_limit: var_or(&lookup, "GAS_LIMIT", DEFAULT_GAS_LIMIT)?,
        };

        Ok(Self {
            scaling,
            pools,
            prover,
            submit,
        })
    }

    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// The signing key, read only when a transaction is about to be built.
pub fn private_key_from_env() -> Result<String> {
    std::env::var("PRIVATE_KEY").context("PRIVATE_KEY not set")
}

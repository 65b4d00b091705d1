use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::price::NormalizedPrice;

/// Shared between circuit-input scaling and the displayed difference.
pub const DEFAULT_SCALING_FACTOR: u64 = 10_000_000_000;

/// Bit width of every circuit input.
pub const DEFAULT_CIRCUIT_INPUT_BITS: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub scaling_factor: u64,
    pub circuit_input_bits: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            scaling_factor: DEFAULT_SCALING_FACTOR,
            circuit_input_bits: DEFAULT_CIRCUIT_INPUT_BITS,
        }
    }
}

impl ScalingConfig {
    /// A usable configuration has a non-zero factor and a 1..=64 bit width.
    pub fn validate(&self) -> Result<(), ScaleError> {
        if self.scaling_factor == 0 {
            return Err(ScaleError::ZeroScalingFactor);
        }
        if self.circuit_input_bits == 0 || self.circuit_input_bits > 64 {
            return Err(ScaleError::UnsupportedWidth(self.circuit_input_bits));
        }
        Ok(())
    }

    /// Largest value a circuit input may take.
    pub fn input_ceiling(&self) -> Result<U256, ScaleError> {
        self.validate()?;
        Ok((U256::from(1u64) << self.circuit_input_bits as usize) - U256::from(1u64))
    }
}

// =============================================================================
//                              SCALED INPUTS
// =============================================================================

/// The three named circuit inputs, already inside the circuit's bit width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledInput {
    pub price1: u64,
    pub price2: u64,
    pub threshold: u64,
}

impl ScaledInput {
    /// The witness input document: `{price1, price2, threshold}` as decimal strings.
    pub fn circuit_inputs(&self) -> serde_json::Value {
        serde_json::json!({
            "price1": self.price1.to_string(),
            "price2": self.price2.to_string(),
            "threshold": self.threshold.to_string(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScaleError {
    #[error("scaling factor must be non-zero")]
    ZeroScalingFactor,

    #[error("circuit input width {0} bits is outside 1..=64")]
    UnsupportedWidth(u32),

    #[error("{name} = {value} does not fit the {bits}-bit circuit input")]
    OutOfRange {
        name: &'static str,
        value: U256,
        bits: u32,
    },
}

fn fit(name: &'static str, value: U256, scaling: &ScalingConfig) -> Result<u64, ScaleError> {
    if value > scaling.input_ceiling()? {
        return Err(ScaleError::OutOfRange {
            name,
            value,
            bits: scaling.circuit_input_bits,
        });
    }
    Ok(value.to::<u64>())
}

/// Map two normalized prices and a caller threshold into the circuit domain.
///
/// Prices are divided by the scaling factor (floor); the threshold is already
/// in scaled units and passes through. Whether the threshold is met is the
/// circuit's business, so nothing here compares the two.
pub fn scale_inputs(
    price1: NormalizedPrice,
    price2: NormalizedPrice,
    threshold: u64,
    scaling: &ScalingConfig,
) -> Result<ScaledInput, ScaleError> {
    scaling.validate()?;
    Ok(ScaledInput {
        price1: fit("price1", price1.scaled(scaling)?, scaling)?,
        price2: fit("price2", price2.scaled(scaling)?, scaling)?,
        threshold: fit("threshold", U256::from(threshold), scaling)?,
    })
}

// =============================================================================
//                             THRESHOLD GATE
// =============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("threshold must be greater than zero")]
    ZeroThreshold,

    #[error("price difference {difference} is below the threshold {threshold}")]
    BelowThreshold { difference: U256, threshold: u64 },
}

/// Caller-side check run before asking for a proof: `threshold > 0` and
/// `difference >= threshold`, both at display scale.
pub fn check_threshold(difference: U256, threshold: u64) -> Result<(), GateError> {
    if threshold == 0 {
        return Err(GateError::ZeroThreshold);
    }
    if difference < U256::from(threshold) {
        return Err(GateError::BelowThreshold {
            difference,
            threshold,
        });
    }
    Ok(())
}

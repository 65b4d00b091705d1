use alloy_primitives::aliases::{U160, U512};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scale::{ScaleError, ScalingConfig};

/// Largest power-of-ten exponent accepted in a [`PriceFormula`].
pub const MAX_DECIMAL_EXPONENT: u32 = 38;

// =============================================================================
//                              POOL READINGS
// =============================================================================

/// A single `slot0()` reading from a concentrated-liquidity pool.
///
/// Only the square-root price matters here; the rest of the slot is dropped by
/// the reader. The true token1/token0 ratio is `(sqrt_price_x96 / 2^96)^2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSlot0 {
    pub sqrt_price_x96: U160,
}

impl RawSlot0 {
    pub fn new(sqrt_price_x96: U160) -> Self {
        Self { sqrt_price_x96 }
    }
}

/// Which side of the pair a pool prices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// `ratio * 10^adjustment`
    QuotePerBase,
    /// `1 / (ratio * 10^adjustment)`
    BasePerQuote,
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "quote-per-base" => Ok(Self::QuotePerBase),
            "base-per-quote" => Ok(Self::BasePerQuote),
            other => Err(format!(
                "unknown orientation '{other}' (expected quote-per-base or base-per-quote)"
            )),
        }
    }
}

/// How a raw pool reading becomes a comparable integer price.
///
/// `decimals_adjustment` is `decimals(token0) - decimals(token1)`, and the
/// oriented value is multiplied by `10^output_decimals` before rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFormula {
    pub orientation: Orientation,
    pub decimals_adjustment: i32,
    pub output_decimals: u32,
}

// =============================================================================
//                            NORMALIZED PRICES
// =============================================================================

/// A decimal-scaled integer price, comparable across the two pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPrice(pub U256);

impl NormalizedPrice {
    pub fn value(&self) -> U256 {
        self.0
    }

    /// `floor(price / scaling_factor)`, the unit the circuit and the UI work in.
    pub fn scaled(&self, scaling: &ScalingConfig) -> Result<U256, ScaleError> {
        self.0
            .checked_div(U256::from(scaling.scaling_factor))
            .ok_or(ScaleError::ZeroScalingFactor)
    }
}

impl std::fmt::Display for NormalizedPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A zero square-root price means the pool was never initialized.
    #[error("pool reports a zero sqrt price (uninitialized pool)")]
    Uninitialized,

    #[error("decimal exponent {0} out of range (limit {MAX_DECIMAL_EXPONENT})")]
    ExponentOutOfRange(i64),

    #[error("normalized price does not fit in 256 bits")]
    Overflow,
}

fn pow10(exp: u32) -> U512 {
    (0..exp).fold(U512::from(1u64), |acc, _| acc * U512::from(10u64))
}

fn widen(value: U160) -> U512 {
    U512::from_limbs_slice(value.as_limbs())
}

fn narrow(value: U512) -> Result<U256, NormalizeError> {
    if value.bit_len() > 256 {
        return Err(NormalizeError::Overflow);
    }
    Ok(U256::from_limbs_slice(&value.as_limbs()[..4]))
}

fn scale_up(value: U512, exp: u32) -> Result<U512, NormalizeError> {
    value.checked_mul(pow10(exp)).ok_or(NormalizeError::Overflow)
}

/// Convert a raw pool reading into a [`NormalizedPrice`].
///
/// The computation is exact rational arithmetic on 512-bit integers:
/// `sqrt^2 / 2^192` is kept as a numerator/denominator pair, the decimals
/// adjustment and orientation move powers of ten and the fraction itself
/// between the two sides, and the final division rounds half up.
pub fn normalize(slot0: &RawSlot0, formula: &PriceFormula) -> Result<NormalizedPrice, NormalizeError> {
    if slot0.sqrt_price_x96.is_zero() {
        return Err(NormalizeError::Uninitialized);
    }
    let adjustment = formula.decimals_adjustment.unsigned_abs();
    if adjustment > MAX_DECIMAL_EXPONENT {
        return Err(NormalizeError::ExponentOutOfRange(formula.decimals_adjustment as i64));
    }
    if formula.output_decimals > MAX_DECIMAL_EXPONENT {
        return Err(NormalizeError::ExponentOutOfRange(formula.output_decimals as i64));
    }

    let sqrt = widen(slot0.sqrt_price_x96);
    let mut numerator = sqrt * sqrt;
    let mut denominator = U512::from(1u64) << 192usize;

    if formula.decimals_adjustment >= 0 {
        numerator = scale_up(numerator, adjustment)?;
    } else {
        denominator = scale_up(denominator, adjustment)?;
    }

    if formula.orientation == Orientation::BasePerQuote {
        std::mem::swap(&mut numerator, &mut denominator);
    }

    numerator = scale_up(numerator, formula.output_decimals)?;
    let half = denominator >> 1usize;
    let rounded = numerator.checked_add(half).ok_or(NormalizeError::Overflow)? / denominator;
    narrow(rounded).map(NormalizedPrice)
}

// =============================================================================
//                              PRICE SNAPSHOT
// =============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Both normalized prices plus their difference at display scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price1: NormalizedPrice,
    pub price2: NormalizedPrice,
    pub difference: U256,
}

impl PriceSnapshot {
    pub fn compute(
        first: (&RawSlot0, &PriceFormula),
        second: (&RawSlot0, &PriceFormula),
        scaling: &ScalingConfig,
    ) -> Result<Self, SnapshotError> {
        scaling.validate()?;
        let price1 = normalize(first.0, first.1)?;
        let price2 = normalize(second.0, second.1)?;
        Ok(Self {
            price1,
            price2,
            difference: display_difference(price1, price2, scaling)?,
        })
    }
}

/// `floor(max / SF) - floor(min / SF)`; never negative, whichever side is higher.
pub fn display_difference(
    a: NormalizedPrice,
    b: NormalizedPrice,
    scaling: &ScalingConfig,
) -> Result<U256, ScaleError> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Ok(high.scaled(scaling)? - low.scaled(scaling)?)
}

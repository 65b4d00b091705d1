//! Pure core of the price-discrepancy proof pipeline.
//!
//! Raw pool readings become normalized prices ([`price`]), normalized prices
//! become circuit inputs ([`scale`]), and the prover's calldata export becomes
//! typed verifier arguments ([`calldata`]). Nothing here does I/O.

pub mod calldata;
pub mod price;
pub mod scale;

pub use alloy_primitives::{aliases::U160, U256};
pub use calldata::{promote, promote_all, ArrayPart, CalldataArgs, ParseError, PLONK_PROOF_ELEMENTS};
pub use price::{
    display_difference, normalize, NormalizeError, NormalizedPrice, Orientation, PriceFormula,
    PriceSnapshot, RawSlot0, SnapshotError,
};
pub use scale::{
    check_threshold, scale_inputs, GateError, ScaleError, ScaledInput, ScalingConfig,
    DEFAULT_CIRCUIT_INPUT_BITS, DEFAULT_SCALING_FACTOR,
};

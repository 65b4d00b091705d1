//! Parsing of the prover's Solidity calldata export.
//!
//! The exporter prints the verifier arguments as two array literals written
//! back to back with nothing between them:
//!
//! ```text
//! ["0x1f..", "0x0a..", ...]["0x..."]
//! ```
//!
//! The blob is split once, at the first `]`; each half is then parsed as JSON
//! on its own. Anything else about the shape is a [`ParseError`].

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Number of field elements in a PLONK proof as the verifier consumes it.
pub const PLONK_PROOF_ELEMENTS: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayPart {
    Proof,
    Signals,
}

impl std::fmt::Display for ArrayPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayPart::Proof => f.write_str("proof array"),
            ArrayPart::Signals => f.write_str("public-signals array"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("calldata blob has no closing bracket to split on")]
    MissingBoundary,

    #[error("{part} is not a valid array literal: {message}")]
    InvalidArray { part: ArrayPart, message: String },

    #[error("{0} is empty")]
    EmptyArray(ArrayPart),

    #[error("{part} element {index} is not an integer literal: {value}")]
    InvalidElement {
        part: ArrayPart,
        index: usize,
        value: String,
    },

    #[error("'{0}' is not a decimal or hexadecimal 256-bit integer")]
    InvalidInteger(String),

    #[error("calldata carries {found} public signals but the prover reported {expected}")]
    SignalCountMismatch { expected: usize, found: usize },
}

/// The verifier call arguments, each element promoted to `uint256`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalldataArgs {
    pub proof_args: Vec<U256>,
    pub signal_args: Vec<U256>,
}

impl CalldataArgs {
    /// Parse an exported calldata blob.
    pub fn parse(blob: &str) -> Result<Self, ParseError> {
        let (proof_literal, signals_literal) = split_arrays(blob)?;
        Ok(Self {
            proof_args: parse_array(&proof_literal, ArrayPart::Proof)?,
            signal_args: parse_array(signals_literal, ArrayPart::Signals)?,
        })
    }

    /// Parse an exported blob and check it against the public signals the
    /// prover returned alongside the proof.
    pub fn from_export(blob: &str, public_signals: &[String]) -> Result<Self, ParseError> {
        let args = Self::parse(blob)?;
        if args.signal_args.len() != public_signals.len() {
            return Err(ParseError::SignalCountMismatch {
                expected: public_signals.len(),
                found: args.signal_args.len(),
            });
        }
        Ok(args)
    }

    /// The proof as the fixed-size array the PLONK verifier takes.
    pub fn plonk_proof(&self) -> Option<[U256; PLONK_PROOF_ELEMENTS]> {
        self.proof_args.as_slice().try_into().ok()
    }
}

/// Split at the first `]`, giving back the closing bracket the split consumed.
fn split_arrays(blob: &str) -> Result<(String, &str), ParseError> {
    let (head, tail) = blob.trim().split_once(']').ok_or(ParseError::MissingBoundary)?;
    Ok((format!("{head}]"), tail))
}

fn parse_array(literal: &str, part: ArrayPart) -> Result<Vec<U256>, ParseError> {
    let values: Vec<Value> =
        serde_json::from_str(literal).map_err(|e| ParseError::InvalidArray {
            part,
            message: e.to_string(),
        })?;
    if values.is_empty() {
        return Err(ParseError::EmptyArray(part));
    }
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let invalid = || ParseError::InvalidElement {
                part,
                index,
                value: value.to_string(),
            };
            match value {
                Value::String(s) => promote(s).map_err(|_| invalid()),
                Value::Number(n) => n.as_u64().map(U256::from).ok_or_else(invalid),
                _ => Err(invalid()),
            }
        })
        .collect()
}

// =============================================================================
//                           INTEGER PROMOTION
// =============================================================================

/// Promote a prover-emitted integer string to `uint256`.
///
/// `0x`-prefixed strings are hex. Otherwise all-decimal digits are read as
/// decimal, and anything else made of hex digits is read as hex (`"a3"` is
/// 163).
pub fn promote(raw: &str) -> Result<U256, ParseError> {
    let s = raw.trim();
    let invalid = || ParseError::InvalidInteger(raw.to_string());

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err(invalid());
        }
        return U256::from_str_radix(hex, 16).map_err(|_| invalid());
    }
    if s.is_empty() {
        return Err(invalid());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return U256::from_str_radix(s, 10).map_err(|_| invalid());
    }
    if s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return U256::from_str_radix(s, 16).map_err(|_| invalid());
    }
    Err(invalid())
}

/// Promote every public signal, failing on the first bad one.
pub fn promote_all(signals: &[String]) -> Result<Vec<U256>, ParseError> {
    signals.iter().map(|s| promote(s)).collect()
}

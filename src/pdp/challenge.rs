use std::collections::HashSet;

use num_bigint::BigUint;

use crate::common::datastructures::{Challenge, QElement};
use crate::error::CodecError;

/// Decode raw chain arrays into `(index, coefficient)` pairs.
///
/// Indices are 1-based; 0 is rejected as malformed rather than being
/// remapped to 1 the way the legacy decoder did.
pub fn decode(indices: &[u32], coefficients: &[Vec<u8>]) -> Result<Vec<QElement>, CodecError> {
    if indices.len() != coefficients.len() {
        return Err(CodecError::LengthMismatch {
            indices: indices.len(),
            coefficients: coefficients.len(),
        });
    }
    let mut seen = HashSet::with_capacity(indices.len());
    let mut out = Vec::with_capacity(indices.len());
    for (&idx, coeff) in indices.iter().zip(coefficients.iter()) {
        if idx == 0 {
            return Err(CodecError::ZeroIndex);
        }
        if !seen.insert(idx) {
            return Err(CodecError::DuplicateIndex(idx as u64));
        }
        if coeff.is_empty() {
            return Err(CodecError::EmptyCoefficient(idx as u64));
        }
        out.push(QElement {
            i: idx as u64,
            v: BigUint::from_bytes_be(coeff),
        });
    }
    Ok(out)
}

pub fn decode_challenge(challenge: &Challenge) -> Result<Vec<QElement>, CodecError> {
    decode(&challenge.block_indices, &challenge.coefficients)
}

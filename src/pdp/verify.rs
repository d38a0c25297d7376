use crate::common::datastructures::{Challenge, Proof, TagHeader};
use crate::crypto::{Scheme, SchemeAlgebra};

use super::challenge::decode_challenge;

/// Checks the aggregation equation from public data only. Runs on the
/// remote party and consumes exactly the wire types the prover emits.
/// Pure and deterministic.
pub struct ProofVerifier<'a> {
    scheme: &'a Scheme,
}

impl<'a> ProofVerifier<'a> {
    pub fn new(scheme: &'a Scheme) -> Self {
        Self { scheme }
    }

    pub fn verify(
        &self,
        header: &TagHeader,
        root_hash: Option<&str>,
        challenge: &Challenge,
        proof: &Proof,
    ) -> bool {
        let q = match decode_challenge(challenge) {
            Ok(q) => q,
            Err(_) => return false,
        };
        if q.is_empty() || q.iter().any(|qe| qe.i > header.n) {
            return false;
        }
        self.scheme.verify_equation(header, root_hash, &q, proof)
    }
}

use num_bigint::BigUint;
use num_traits::Zero;

use crate::common::datastructures::{MerkleAux, Proof, QElement, Tag};
use crate::crypto::{Scheme, SchemeAlgebra, SchemeKind};
use crate::error::ProofError;
use crate::merkle::MerkleTree;
use crate::utils::{sha256_bytes, sha256_hex};

fn segment_of(block: &[u8], slot: usize, segment_size: u64) -> &[u8] {
    let seg = (segment_size as usize).max(1);
    let start = slot.saturating_mul(seg);
    if start >= block.len() {
        return &[];
    }
    let end = (start + seg).min(block.len());
    &block[start..end]
}

/// Aggregates challenged blocks and their authenticators into one
/// compact proof. CPU-bound and synchronous; the caller owns all I/O.
pub struct ProofGenerator<'a> {
    scheme: &'a Scheme,
}

impl<'a> ProofGenerator<'a> {
    pub fn new(scheme: &'a Scheme) -> Self {
        Self { scheme }
    }

    pub fn generate(
        &self,
        tag: &Tag,
        q: &[QElement],
        blocks: &[Vec<u8>],
        segment_size: u64,
    ) -> Result<Proof, ProofError> {
        // reject a forged or stale tag before spending any algebra
        let digest = super::header_digest(&tag.header)?;
        if !self.scheme.verify_digest(&digest, &tag.signature) {
            return Err(ProofError::TagInvalid);
        }

        let n = tag.header.n;
        if blocks.len() as u64 != n {
            return Err(ProofError::BlockCountMismatch {
                expected: n,
                actual: blocks.len() as u64,
            });
        }
        for qe in q {
            if qe.i == 0 || qe.i > n {
                return Err(ProofError::IndexOutOfRange { index: qe.i, n });
            }
        }

        // mu_j = sum_i v_i * m_ij, one slot per base element
        let mut mu = Vec::with_capacity(tag.header.u.len());
        for slot in 0..tag.header.u.len() {
            let mut acc = BigUint::zero();
            for qe in q {
                let block = &blocks[(qe.i - 1) as usize];
                let value = self.scheme.segment_value(segment_of(block, slot, segment_size));
                acc += &qe.v * value;
            }
            mu.push(self.scheme.reduce_mu(acc).to_bytes_be());
        }

        let sigma = self.scheme.aggregate_sigma(&tag.sigmas, q)?;

        let aux = match self.scheme.kind() {
            SchemeKind::Rsa => Some(self.merkle_aux(q, blocks)),
            SchemeKind::Pairing => None,
        };

        Ok(Proof { mu, sigma, aux })
    }

    fn merkle_aux(&self, q: &[QElement], blocks: &[Vec<u8>]) -> MerkleAux {
        let leaves: Vec<String> = blocks.iter().map(|b| sha256_hex(b)).collect();
        let tree = MerkleTree::new(&leaves);
        let indices: Vec<usize> = q.iter().map(|qe| (qe.i - 1) as usize).collect();
        MerkleAux {
            hash_mi: q
                .iter()
                .map(|qe| sha256_bytes(&blocks[(qe.i - 1) as usize]).to_vec())
                .collect(),
            nodes: tree.aux_nodes(&indices),
        }
    }
}

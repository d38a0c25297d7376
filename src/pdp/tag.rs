use std::thread;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::common::datastructures::{FileKind, Tag, TagHeader};
use crate::crypto::keys::KeyMaterial;
use crate::crypto::{Scheme, SchemeAlgebra, SchemeKind};
use crate::error::{CryptoError, ProofError};
use crate::merkle::MerkleTree;
use crate::utils::{log_msg, sha256_hex};

pub const BYTE_SIZE_1KB: u64 = 1024;
/// Filler files always split at the fixed sizes below.
pub const SPACE_BLOCK_SIZE: u64 = 1024 * 1024;
pub const SPACE_SEGMENT_SIZE: u64 = 512 * 1024;

const TAG_NAME_LEN: usize = 32;

/// Block and segment sizing for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPolicy {
    pub block_size: u64,
    pub segment_size: u64,
}

impl BlockPolicy {
    pub fn segment_slots(&self) -> usize {
        if self.segment_size == 0 {
            return 1;
        }
        self.block_size.div_ceil(self.segment_size) as usize
    }
}

/// Service files under 1 KiB become a single block; larger ones split
/// at size/16 capped at u32::MAX, with eighth-size segments. Filler
/// files use the fixed constants.
pub fn policy_for(kind: FileKind, file_size: u64) -> BlockPolicy {
    match kind {
        FileKind::Space => BlockPolicy {
            block_size: SPACE_BLOCK_SIZE,
            segment_size: SPACE_SEGMENT_SIZE,
        },
        FileKind::Service => {
            if file_size < BYTE_SIZE_1KB {
                return BlockPolicy {
                    block_size: file_size,
                    segment_size: file_size,
                };
            }
            let block_size = (file_size / 16).min(u32::MAX as u64);
            BlockPolicy {
                block_size,
                segment_size: block_size / 8,
            }
        }
    }
}

/// Split file bytes into blocks. Service files must divide evenly;
/// filler files zero-pad the final block.
pub fn split_blocks(
    data: &[u8],
    kind: FileKind,
    policy: &BlockPolicy,
) -> Result<Vec<Vec<u8>>, ProofError> {
    let block_size = policy.block_size as usize;
    if data.is_empty() || block_size == 0 {
        return Err(ProofError::UnalignedFile {
            len: data.len() as u64,
            block_size: policy.block_size,
        });
    }
    if kind == FileKind::Service && data.len() % block_size != 0 {
        return Err(ProofError::UnalignedFile {
            len: data.len() as u64,
            block_size: policy.block_size,
        });
    }
    let mut blocks: Vec<Vec<u8>> = data.chunks(block_size).map(|c| c.to_vec()).collect();
    if let Some(last) = blocks.last_mut() {
        if last.len() < block_size {
            last.resize(block_size, 0);
        }
    }
    Ok(blocks)
}

/// Produces the per-file authenticator bundle at ingest. Runs once per
/// stored file; the dominant cost is the per-block authenticator pass,
/// fanned out over a bounded worker set.
pub struct TagGenerator<'a> {
    scheme: &'a Scheme,
    keys: &'a KeyMaterial,
}

impl<'a> TagGenerator<'a> {
    pub fn new(scheme: &'a Scheme, keys: &'a KeyMaterial) -> Self {
        Self { scheme, keys }
    }

    pub fn generate(&self, data: &[u8], kind: FileKind) -> Result<Tag, ProofError> {
        let policy = policy_for(kind, data.len() as u64);
        self.generate_with_policy(data, kind, policy)
    }

    pub fn generate_with_policy(
        &self,
        data: &[u8],
        kind: FileKind,
        policy: BlockPolicy,
    ) -> Result<Tag, ProofError> {
        let blocks = split_blocks(data, kind, &policy)?;
        let n = blocks.len();

        let mut rng = rand::thread_rng();
        let mut name = vec![0u8; TAG_NAME_LEN];
        rng.fill_bytes(&mut name);
        let bases: Vec<Vec<u8>> = (0..policy.segment_slots())
            .map(|_| self.scheme.random_base(&mut rng))
            .collect::<Result<_, _>>()?;

        let sigmas = self.compute_sigmas(&name, &blocks, &bases, policy.segment_size)?;

        // the Merkle commitment backs the modular variant's inclusion proofs
        let root_hash = match self.scheme.kind() {
            SchemeKind::Rsa => {
                let leaves: Vec<String> = blocks.iter().map(|b| sha256_hex(b)).collect();
                Some(MerkleTree::new(&leaves).root())
            }
            SchemeKind::Pairing => None,
        };

        let header = TagHeader {
            name,
            n: n as u64,
            u: bases,
        };
        let digest = super::header_digest(&header)?;
        let signature = self.keys.sign(&digest)?;
        log_msg(
            "DEBUG",
            "TAG",
            None,
            &format!("tagged {} blocks of {} bytes", n, policy.block_size),
        );

        Ok(Tag {
            header,
            signature,
            sigmas,
            root_hash,
        })
    }

    /// Authenticators are independent per block: a bounded set of scoped
    /// workers fills disjoint output stripes and joins before the tag
    /// exists, so a partial tag can never be observed.
    fn compute_sigmas(
        &self,
        name: &[u8],
        blocks: &[Vec<u8>],
        bases: &[Vec<u8>],
        segment_size: u64,
    ) -> Result<Vec<Vec<u8>>, ProofError> {
        let n = blocks.len();
        let workers = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1)
            .clamp(1, n);
        let stripe = n.div_ceil(workers);
        let mut sigmas: Vec<Vec<u8>> = vec![Vec::new(); n];

        let scheme = self.scheme;
        let secret = self.keys.secret();
        let results: Vec<Result<(), CryptoError>> = thread::scope(|s| {
            let mut handles = Vec::new();
            for (wi, (out_stripe, block_stripe)) in sigmas
                .chunks_mut(stripe)
                .zip(blocks.chunks(stripe))
                .enumerate()
            {
                let base_index = wi * stripe;
                handles.push(s.spawn(move || {
                    for (off, (slot, block)) in
                        out_stripe.iter_mut().zip(block_stripe.iter()).enumerate()
                    {
                        let index = (base_index + off + 1) as u64;
                        *slot = scheme.block_authenticator(
                            secret,
                            name,
                            index,
                            block,
                            bases,
                            segment_size,
                        )?;
                    }
                    Ok(())
                }));
            }
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or(Err(CryptoError::Internal("tag worker panicked")))
                })
                .collect()
        });
        for result in results {
            result?;
        }
        Ok(sigmas)
    }
}

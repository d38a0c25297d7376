use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::merkle::AuxNode;

/// Content hash / chain handle identifying one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

/// `Service` is user data; `Space` is filler pledged against idle
/// capacity. The kind decides the on-disk directory and block sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Service,
    Space,
}

/// One decoded challenge element: 1-based block index plus the
/// chain-issued coefficient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QElement {
    pub i: u64,
    pub v: BigUint,
}

/// A chain-issued spot check, immutable once fetched. Indices are
/// 1-based, unique and bounded by the tagged block count; coefficient
/// bytes derive from `random_seed` on the chain side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub file_id: FileId,
    pub file_kind: FileKind,
    pub block_indices: Vec<u32>,
    pub coefficients: Vec<Vec<u8>>,
    #[serde(with = "serde_bytes")]
    pub random_seed: Vec<u8>,
    pub issued_at_block: u64,
    pub deadline_block: u64,
}

/// The signed public half of a tag: anti-replay label, block count and
/// the per-segment base elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagHeader {
    #[serde(with = "serde_bytes")]
    pub name: Vec<u8>,
    pub n: u64,
    pub u: Vec<Vec<u8>>,
}

/// Per-file authenticator bundle, generated once at ingest and persisted
/// beside the file. `sigmas.len() == n == ceil(file_size / block_size)`.
/// `root_hash` is carried by the RSA/Merkle variant only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub header: TagHeader,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub sigmas: Vec<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_hash: Option<String>,
}

/// Inclusion material for the RSA variant: the challenged blocks'
/// content digests and the minimal node set proving their positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleAux {
    pub hash_mi: Vec<Vec<u8>>,
    pub nodes: Vec<AuxNode>,
}

/// Aggregated proof. `mu` holds one big-endian linear combination per
/// segment slot; its size depends on the segment count only, never on
/// the file size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub mu: Vec<Vec<u8>>,
    #[serde(with = "serde_bytes")]
    pub sigma: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<MerkleAux>,
}

/// One submission record: a proof bound to the exact challenge it
/// answers, stamped with the miner account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProveInfo {
    pub file_id: FileId,
    #[serde(with = "serde_bytes")]
    pub miner_acc: Vec<u8>,
    pub challenge: Challenge,
    pub proof: Proof,
}

use crate::common::datastructures::{Challenge, FileId, ProveInfo};
use crate::error::ChainError;

pub type TxHash = String;

/// The blockchain collaborator, implemented outside this subsystem.
/// The connection behind it is a single shared resource with its own
/// reconnect discipline; callers only see these three operations.
pub trait ChainClient: Send + Sync {
    /// Outstanding challenges addressed to this miner.
    /// `Err(ChainError::Empty)` is the normal idle answer.
    fn get_challenges(&self) -> Result<Vec<Challenge>, ChainError>;

    fn submit_proofs(&self, batch: &[ProveInfo]) -> Result<TxHash, ChainError>;

    /// Files the chain has marked invalid, consumed by the cleanup
    /// worker.
    fn get_invalid_files(&self) -> Result<Vec<FileId>, ChainError>;
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

impl ProveInfo {
    /// The byte layout the remote verifier decodes: every
    /// variable-length field is u32-LE length prefixed, fields in fixed
    /// order. Changing this breaks live deployments; the layout test
    /// below pins it.
    pub fn encode_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_bytes(&mut out, self.file_id.as_str().as_bytes());
        put_bytes(&mut out, &self.miner_acc);

        let c: &Challenge = &self.challenge;
        out.push(match c.file_kind {
            crate::common::datastructures::FileKind::Service => 0,
            crate::common::datastructures::FileKind::Space => 1,
        });
        put_u32(&mut out, c.block_indices.len() as u32);
        for idx in &c.block_indices {
            put_u32(&mut out, *idx);
        }
        put_u32(&mut out, c.coefficients.len() as u32);
        for coeff in &c.coefficients {
            put_bytes(&mut out, coeff);
        }
        put_bytes(&mut out, &c.random_seed);
        put_u64(&mut out, c.issued_at_block);
        put_u64(&mut out, c.deadline_block);

        put_u32(&mut out, self.proof.mu.len() as u32);
        for mu_j in &self.proof.mu {
            put_bytes(&mut out, mu_j);
        }
        put_bytes(&mut out, &self.proof.sigma);
        match &self.proof.aux {
            None => out.push(0),
            Some(aux) => {
                out.push(1);
                put_u32(&mut out, aux.hash_mi.len() as u32);
                for h in &aux.hash_mi {
                    put_bytes(&mut out, h);
                }
                put_u32(&mut out, aux.nodes.len() as u32);
                for node in &aux.nodes {
                    put_u32(&mut out, node.level);
                    put_u64(&mut out, node.index);
                    put_bytes(&mut out, node.hash.as_bytes());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::datastructures::{FileKind, MerkleAux, Proof};
    use crate::merkle::AuxNode;

    fn sample() -> ProveInfo {
        ProveInfo {
            file_id: FileId::from("fid"),
            miner_acc: vec![0xaa, 0xbb],
            challenge: Challenge {
                file_id: FileId::from("fid"),
                file_kind: FileKind::Space,
                block_indices: vec![1, 3],
                coefficients: vec![vec![2], vec![5]],
                random_seed: vec![7],
                issued_at_block: 10,
                deadline_block: 20,
            },
            proof: Proof {
                mu: vec![vec![0x2b]],
                sigma: vec![0x01, 0x02],
                aux: Some(MerkleAux {
                    hash_mi: vec![vec![0xcc]],
                    nodes: vec![AuxNode { level: 0, index: 1, hash: "ab".into() }],
                }),
            },
        }
    }

    #[test]
    fn wire_layout_is_pinned() {
        let encoded = sample().encode_wire();
        let expected: Vec<u8> = vec![
            3, 0, 0, 0, b'f', b'i', b'd', // file_id
            2, 0, 0, 0, 0xaa, 0xbb, // miner account
            1, // kind: space
            2, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, // indices [1, 3]
            2, 0, 0, 0, 1, 0, 0, 0, 2, 1, 0, 0, 0, 5, // coefficients [[2], [5]]
            1, 0, 0, 0, 7, // random seed
            10, 0, 0, 0, 0, 0, 0, 0, // issued at
            20, 0, 0, 0, 0, 0, 0, 0, // deadline
            1, 0, 0, 0, 1, 0, 0, 0, 0x2b, // mu [[0x2b]]
            2, 0, 0, 0, 0x01, 0x02, // sigma
            1, // aux present
            1, 0, 0, 0, 1, 0, 0, 0, 0xcc, // hash_mi [[0xcc]]
            1, 0, 0, 0, // one aux node
            0, 0, 0, 0, // level 0
            1, 0, 0, 0, 0, 0, 0, 0, // index 1
            2, 0, 0, 0, b'a', b'b', // hash "ab"
        ];
        assert_eq!(encoded, expected);
    }

    #[test]
    fn absent_aux_encodes_a_zero_marker() {
        let mut info = sample();
        info.proof.aux = None;
        let encoded = info.encode_wire();
        assert_eq!(*encoded.last().unwrap(), 0);
    }
}

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::utils::h_join;

/// One node of the auxiliary set shipped with an RSA-variant proof:
/// `level` 0 is the leaf row, `index` the position within that row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxNode {
    pub level: u32,
    pub index: u64,
    pub hash: String,
}

/// Positional hash tree over hex-encoded leaf digests. An odd row is
/// extended by duplicating its last node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleTree {
    pub leaves: Vec<String>,
    pub levels: Vec<Vec<String>>,
}

fn parent_hash(left: &str, right: &str) -> String {
    h_join(["merkle", left, right])
}

fn empty_root() -> String {
    h_join(["empty"])
}

impl MerkleTree {
    pub fn new(leaves: &[String]) -> Self {
        let mut tree = Self {
            leaves: leaves.to_vec(),
            levels: Vec::new(),
        };
        if tree.leaves.is_empty() {
            tree.levels.push(Vec::new());
        } else {
            tree.build();
        }
        tree
    }

    fn build(&mut self) {
        let mut level = self.leaves.clone();
        self.levels.push(level.clone());
        while level.len() > 1 {
            let mut next_level = Vec::new();
            for chunk in level.chunks(2) {
                let left = &chunk[0];
                let right = if chunk.len() > 1 { &chunk[1] } else { left };
                next_level.push(parent_hash(left, right));
            }
            level = next_level.clone();
            self.levels.push(level.clone());
        }
    }

    pub fn root(&self) -> String {
        if self.leaves.is_empty() {
            return empty_root();
        }
        self.levels
            .last()
            .and_then(|lvl| lvl.first())
            .cloned()
            .unwrap_or_else(empty_root)
    }

    /// Minimal node set a verifier needs to recompute the root from the
    /// leaves at `indices`. Siblings already covered by the challenged
    /// set (or derivable as duplicated row ends) are not included.
    pub fn aux_nodes(&self, indices: &[usize]) -> Vec<AuxNode> {
        let mut aux: IndexMap<(u32, u64), String> = IndexMap::new();
        let mut needed: BTreeSet<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.leaves.len())
            .collect();
        for (level_no, level) in self.levels.iter().enumerate() {
            if level.len() <= 1 {
                break;
            }
            let mut next_needed = BTreeSet::new();
            for &i in &needed {
                let sib = i ^ 1;
                if sib < level.len() && !needed.contains(&sib) {
                    aux.insert((level_no as u32, sib as u64), level[sib].clone());
                }
                next_needed.insert(i / 2);
            }
            needed = next_needed;
        }
        aux.into_iter()
            .map(|((level, index), hash)| AuxNode { level, index, hash })
            .collect()
    }

    /// Recompute the root from challenged `(index, leaf_hash)` pairs plus
    /// an auxiliary node set, without the full tree. `n_leaves` is the
    /// committed leaf count from the tag header.
    pub fn verify_aux(
        n_leaves: usize,
        challenged: &[(usize, String)],
        aux: &[AuxNode],
        root: &str,
    ) -> bool {
        if n_leaves == 0 || challenged.is_empty() {
            return false;
        }
        let mut known: IndexMap<(u32, u64), String> = IndexMap::new();
        for (i, leaf) in challenged {
            if *i >= n_leaves {
                return false;
            }
            known.insert((0, *i as u64), leaf.clone());
        }
        for node in aux {
            // challenged leaves win over aux entries claiming their slot
            known.entry((node.level, node.index)).or_insert_with(|| node.hash.clone());
        }

        let mut current: BTreeSet<u64> = challenged.iter().map(|(i, _)| *i as u64).collect();
        let mut level_len = n_leaves as u64;
        let mut level = 0u32;
        while level_len > 1 {
            let mut next = BTreeSet::new();
            for &i in &current {
                next.insert(i / 2);
            }
            for &parent in &next {
                let left_idx = parent * 2;
                let right_idx = left_idx + 1;
                let left = match known.get(&(level, left_idx)) {
                    Some(h) => h.clone(),
                    None => return false,
                };
                let right = if right_idx >= level_len {
                    left.clone()
                } else {
                    match known.get(&(level, right_idx)) {
                        Some(h) => h.clone(),
                        None => return false,
                    }
                };
                known.insert((level + 1, parent), parent_hash(&left, &right));
            }
            current = next;
            level_len = level_len.div_ceil(2);
            level += 1;
        }
        known.get(&(level, 0)).map(String::as_str) == Some(root)
    }
}

use super::leaf::{leaf_hash, parent_hash};
use super::{total_earned_as_u256, EMPTY_ROOT};
use crate::domain::{Address, Entry};
use crate::error::{OrchestratorError, Result};

/// A built commitment tree. Keeps every level so proofs can be extracted for
/// any leaf without recomputation (§4.C).
pub struct MerkleTree {
    /// Entries in canonical sort order (ascending lowercased hex address),
    /// parallel to `levels[0]`.
    sorted_entries: Vec<Entry>,
    /// `levels[0]` is the leaf layer; the last level has exactly one node
    /// (the root), unless the tree is empty.
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn root(&self) -> [u8; 32] {
        match self.levels.last() {
            Some(top) if top.len() == 1 => top[0],
            _ => EMPTY_ROOT,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.sorted_entries
    }

    /// Sibling-hash proof for the leaf at `index` (§4.C). Returns `MerkleError`
    /// if `index` is out of range.
    pub fn proof_for_index(&self, index: usize) -> Result<Vec<[u8; 32]>> {
        if self.levels.is_empty() || index >= self.levels[0].len() {
            return Err(OrchestratorError::MerkleError(format!(
                "leaf index {index} out of range"
            )));
        }
        let mut proof = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            if sibling_idx < level.len() {
                proof.push(level[sibling_idx]);
            }
            idx /= 2;
        }
        Ok(proof)
    }

    /// Locates `address` in the canonical sort order and returns its proof
    /// along with its leaf index. `MerkleError` if absent (§4.G).
    pub fn proof_for_address(&self, address: Address) -> Result<(Vec<[u8; 32]>, usize)> {
        let index = self
            .sorted_entries
            .iter()
            .position(|e| e.address == address)
            .ok_or_else(|| {
                OrchestratorError::MerkleError(format!("address {address} not present in tree"))
            })?;
        Ok((self.proof_for_index(index)?, index))
    }
}

/// Builds the full tree over a copy of `entries`, sorted ascending by
/// lowercased hex address (§4.C). The caller's slice is never mutated.
pub fn build_tree(entries: &[Entry]) -> Result<MerkleTree> {
    let mut sorted_entries = entries.to_vec();
    sorted_entries.sort_by(|a, b| a.address.to_lower_hex().cmp(&b.address.to_lower_hex()));

    let leaves: Vec<[u8; 32]> = sorted_entries
        .iter()
        .map(|e| Ok(leaf_hash(e.address, total_earned_as_u256(e)?)))
        .collect::<Result<_>>()?;

    if leaves.is_empty() {
        return Ok(MerkleTree {
            sorted_entries,
            levels: Vec::new(),
        });
    }

    let mut levels = vec![leaves];
    while levels.last().unwrap().len() > 1 {
        let cur = levels.last().unwrap();
        let mut next = Vec::with_capacity(cur.len().div_ceil(2));
        let mut i = 0;
        while i < cur.len() {
            if i + 1 < cur.len() {
                next.push(parent_hash(cur[i], cur[i + 1]));
                i += 2;
            } else {
                next.push(cur[i]);
                i += 1;
            }
        }
        levels.push(next);
    }

    Ok(MerkleTree {
        sorted_entries,
        levels,
    })
}

/// Convenience wrapper returning just the proof + index for `address`
/// (§4.C "Proof extraction").
pub fn generate_proof(entries: &[Entry], address: Address) -> Result<(Vec<[u8; 32]>, usize, [u8; 32])> {
    let tree = build_tree(entries)?;
    let (proof, index) = tree.proof_for_address(address)?;
    Ok((proof, index, tree.root()))
}

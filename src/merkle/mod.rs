//! Merkle commitment engine (Component C, §4.C).
//!
//! Leaf encoding, pair ordering, and the keccak-256 hash function are fixed by
//! on-chain compatibility with the verifier used by `claimSubsidy` — none of
//! the choices in this module are implementation-free.

mod leaf;
mod proof;
mod tree;

pub use leaf::leaf_hash;
pub use proof::verify_proof;
pub use tree::{build_tree, generate_proof, MerkleTree};

use ethereum_types::U256;

use crate::domain::Entry;
use crate::error::{OrchestratorError, Result};

/// All-zero root returned for an empty entry set (§4.C).
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

/// Converts a `BigUint` total into the `U256` the leaf encoder packs into 32
/// big-endian bytes, failing if the value cannot fit (it must, to ever be
/// accepted by the `uint256`-typed verifier contract).
pub fn total_earned_as_u256(entry: &Entry) -> Result<U256> {
    biguint_to_u256(&entry.total_earned).map_err(|_| {
        OrchestratorError::MerkleError(format!(
            "total_earned for {} exceeds 256 bits",
            entry.address
        ))
    })
}

/// As `total_earned_as_u256`, for a bare `BigUint` not attached to an entry
/// (e.g. an aggregate total over many entries).
pub fn biguint_to_u256(value: &num_bigint::BigUint) -> Result<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(OrchestratorError::MerkleError(
            "value exceeds 256 bits".to_string(),
        ));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(U256::from_big_endian(&buf))
}

/// Builds the Merkle root over a caller-supplied entry slice. Sorts a copy of
/// the slice ascending by lowercased hex address first (§4.C); the caller's
/// slice is left untouched.
pub fn build_root(entries: &[Entry]) -> Result<[u8; 32]> {
    Ok(build_tree(entries)?.root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use num_bigint::BigUint;

    fn entry(addr: &str, amount: u64) -> Entry {
        Entry::new(Address::parse(addr).unwrap(), BigUint::from(amount)).unwrap()
    }

    #[test]
    fn empty_entries_root_is_all_zero() {
        assert_eq!(build_root(&[]).unwrap(), EMPTY_ROOT);
    }

    #[test]
    fn single_entry_root_equals_its_leaf() {
        let e = entry("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3", 1_000_000_000_000_000_000);
        let root = build_root(&[e.clone()]).unwrap();
        let expected = leaf_hash(e.address, total_earned_as_u256(&e).unwrap());
        assert_eq!(root, expected);
    }
}

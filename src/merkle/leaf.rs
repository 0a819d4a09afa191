//! Canonical leaf encoding: `keccak256(address(20B) || total_earned(32B BE))`.

use ethereum_types::U256;
use sha3::{Digest, Keccak256};

use crate::domain::Address;

/// Hashes one leaf. Address case never affects the result: `Address` already
/// normalizes to a fixed 20-byte representation on parse (§8 scenario 2).
pub fn leaf_hash(address: Address, total_earned: U256) -> [u8; 32] {
    let mut buf = [0u8; 52];
    buf[..20].copy_from_slice(&address.0);
    total_earned.to_big_endian(&mut buf[20..52]);

    let mut hasher = Keccak256::new();
    hasher.update(buf);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Commutative parent hash: `keccak256(min(a, b) || max(a, b))` under
/// lexicographic byte comparison (§4.C).
pub fn parent_hash(a: [u8; 32], b: [u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&lo);
    buf[32..].copy_from_slice(&hi);

    let mut hasher = Keccak256::new();
    hasher.update(buf);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

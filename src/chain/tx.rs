//! Legacy EIP-155 transaction encoding and signing (§4.E: "RLP-encode and
//! sign a legacy (EIP-155) transaction with `secp256k1`").
//!
//! Grounded on the teacher's `src/utxo_signing.rs` for the secp256k1 signing
//! idiom (`Message::from_slice`, `Secp256k1::sign_ecdsa*`, DER/compact
//! serialization) and on the pack's `MarkusSprunck-openethereum` for
//! `rlp::RlpStream`-based transaction encoding.

use ethereum_types::U256;
use rlp::RlpStream;
use secp256k1::ecdsa::RecoveryId;
use secp256k1::{Message, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

use crate::domain::Address;
use crate::error::{OrchestratorError, Result};

pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn append_common(&self, stream: &mut RlpStream) {
        stream.append(&u256_bytes(self.nonce));
        stream.append(&u256_bytes(self.gas_price));
        stream.append(&u256_bytes(self.gas_limit));
        stream.append(&self.to.0.as_ref());
        stream.append(&u256_bytes(self.value));
        stream.append(&self.data);
    }

    /// The EIP-155 signing payload: the 6 common fields followed by
    /// `(chain_id, 0, 0)`.
    fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_common(&mut stream);
        stream.append(&chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
        keccak256(&stream.out())
    }

    /// Signs the transaction and returns the raw RLP-encoded signed bytes
    /// ready for `eth_sendRawTransaction`.
    pub fn sign(&self, secret_key: &SecretKey, chain_id: u64) -> Result<Vec<u8>> {
        let digest = self.signing_hash(chain_id);
        let message = Message::from_slice(&digest)
            .map_err(|e| OrchestratorError::InvalidInput(format!("building signing message: {e}")))?;

        let secp = Secp256k1::new();
        let recoverable = secp.sign_ecdsa_recoverable(&message, secret_key);
        let (recovery_id, compact) = recoverable.serialize_compact();

        let v = chain_id * 2 + 35 + recovery_id_to_u64(recovery_id);

        let mut stream = RlpStream::new_list(9);
        self.append_common(&mut stream);
        stream.append(&v);
        stream.append(&strip_leading_zeros(&compact[0..32]));
        stream.append(&strip_leading_zeros(&compact[32..64]));
        Ok(stream.out().to_vec())
    }
}

fn recovery_id_to_u64(id: RecoveryId) -> u64 {
    i32::from(id) as u64
}

fn u256_bytes(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    strip_leading_zeros(&buf)
}

fn strip_leading_zeros(buf: &[u8]) -> Vec<u8> {
    let first_nonzero = buf.iter().position(|&b| b != 0);
    match first_nonzero {
        Some(idx) => buf[idx..].to_vec(),
        None => Vec::new(),
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> LegacyTransaction {
        LegacyTransaction {
            nonce: U256::from(0u64),
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: U256::from(300_000u64),
            to: Address::parse("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3").unwrap(),
            value: U256::zero(),
            data: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    #[test]
    fn signing_is_deterministic_for_the_same_key_and_chain() {
        let tx = sample_tx();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let first = tx.sign(&secret_key, 1).unwrap();
        let second = tx.sign(&secret_key, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn different_chain_ids_change_the_signed_bytes() {
        let tx = sample_tx();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let mainnet = tx.sign(&secret_key, 1).unwrap();
        let other = tx.sign(&secret_key, 137).unwrap();
        assert_ne!(mainnet, other);
    }

    #[test]
    fn strip_leading_zeros_collapses_a_zero_value_to_empty() {
        assert!(strip_leading_zeros(&[0u8; 32]).is_empty());
    }
}

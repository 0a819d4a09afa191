//! ABI-packed call data for the contracts the publisher talks to (§6
//! "On-chain interface"). Built with `ethabi`, mirroring the solidity
//! function signatures exactly — argument order and types are an external
//! contract with the deployed verifier, not a free choice.

use ethabi::{Function, Param, ParamType, StateMutability, Token};
use ethereum_types::{Address as EthAddress, U256};

use crate::domain::Address;
use crate::error::{OrchestratorError, Result};

fn function(name: &str, inputs: Vec<(&str, ParamType)>) -> Function {
    #[allow(deprecated)]
    Function {
        name: name.to_string(),
        inputs: inputs
            .into_iter()
            .map(|(n, kind)| Param {
                name: n.to_string(),
                kind,
                internal_type: None,
            })
            .collect(),
        outputs: Vec::new(),
        constant: None,
        state_mutability: StateMutability::NonPayable,
    }
}

fn encode(f: &Function, tokens: &[Token]) -> Result<Vec<u8>> {
    f.encode_input(tokens)
        .map_err(|e| OrchestratorError::InvalidInput(format!("ABI-encoding {}: {e}", f.name)))
}

fn addr_token(address: Address) -> Token {
    Token::Address(EthAddress::from(address.0))
}

/// `EpochManager.startEpoch()`
pub fn start_epoch() -> Result<Vec<u8>> {
    let f = function("startEpoch", vec![]);
    encode(&f, &[])
}

/// `EpochManager.endEpochWithSubsidies(uint256,address,bytes32,uint256)`
pub fn end_epoch_with_subsidies(
    epoch_number: U256,
    vault: Address,
    root: [u8; 32],
    total: U256,
) -> Result<Vec<u8>> {
    let f = function(
        "endEpochWithSubsidies",
        vec![
            ("epochNumber", ParamType::Uint(256)),
            ("vault", ParamType::Address),
            ("root", ParamType::FixedBytes(32)),
            ("total", ParamType::Uint(256)),
        ],
    );
    encode(
        &f,
        &[
            Token::Uint(epoch_number),
            addr_token(vault),
            Token::FixedBytes(root.to_vec()),
            Token::Uint(total),
        ],
    )
}

/// `EpochManager.forceEndEpochWithZeroYield(uint256,address)`
pub fn force_end_epoch_with_zero_yield(epoch_number: U256, vault: Address) -> Result<Vec<u8>> {
    let f = function(
        "forceEndEpochWithZeroYield",
        vec![
            ("epochNumber", ParamType::Uint(256)),
            ("vault", ParamType::Address),
        ],
    );
    encode(&f, &[Token::Uint(epoch_number), addr_token(vault)])
}

/// `EpochManager.allocateYieldToEpoch(uint256)`
pub fn allocate_yield_to_epoch(amount: U256) -> Result<Vec<u8>> {
    let f = function("allocateYieldToEpoch", vec![("amount", ParamType::Uint(256))]);
    encode(&f, &[Token::Uint(amount)])
}

/// `EpochManager.allocateCumulativeYieldToEpoch(uint256,uint256)`
pub fn allocate_cumulative_yield_to_epoch(epoch_number: U256, cumulative_amount: U256) -> Result<Vec<u8>> {
    let f = function(
        "allocateCumulativeYieldToEpoch",
        vec![
            ("epochNumber", ParamType::Uint(256)),
            ("cumulativeAmount", ParamType::Uint(256)),
        ],
    );
    encode(&f, &[Token::Uint(epoch_number), Token::Uint(cumulative_amount)])
}

/// `EpochManager.getCurrentEpochId()`
pub fn get_current_epoch_id() -> Result<Vec<u8>> {
    let f = function("getCurrentEpochId", vec![]);
    encode(&f, &[])
}

/// `EpochManager.updateExchangeRate()`
pub fn update_exchange_rate() -> Result<Vec<u8>> {
    let f = function("updateExchangeRate", vec![]);
    encode(&f, &[])
}

/// `DebtSubsidizer.updateMerkleRoot(address,bytes32,uint256)`
pub fn update_merkle_root(vault: Address, root: [u8; 32], total: U256) -> Result<Vec<u8>> {
    let f = function(
        "updateMerkleRoot",
        vec![
            ("vault", ParamType::Address),
            ("root", ParamType::FixedBytes(32)),
            ("total", ParamType::Uint(256)),
        ],
    );
    encode(
        &f,
        &[addr_token(vault), Token::FixedBytes(root.to_vec()), Token::Uint(total)],
    )
}

/// Decodes the single `uint256` return value of a `getCurrentEpochId()`
/// `eth_call` result.
pub fn decode_current_epoch_id(raw: &[u8]) -> Result<U256> {
    if raw.len() < 32 {
        return Err(OrchestratorError::QueryDecodeError(
            "getCurrentEpochId() returned fewer than 32 bytes".to_string(),
        ));
    }
    Ok(U256::from_big_endian(&raw[0..32]))
}

//! Hash oracle shared by every contract.
//!
//! - Poseidon (circomlib parameters over BN254) for Merkle nodes and identity
//!   commitments, through the host `poseidon_hash` function.
//! - Keccak-256 for group ids and signal hashes, so both can be recomputed by
//!   any EVM-style tooling.

use soroban_sdk::{Bytes, BytesN, Env, Symbol, Vec, U256};

use crate::field_modulus;

/// Poseidon over an arbitrary number of field elements.
pub fn poseidon(env: &Env, inputs: &Vec<U256>) -> U256 {
    let field = Symbol::new(env, "BN254");
    env.crypto().poseidon_hash(inputs, field)
}

/// Poseidon of two U256 values (tree node hash).
pub fn hash_pair(env: &Env, left: &U256, right: &U256) -> U256 {
    poseidon(env, &soroban_sdk::vec![env, left.clone(), right.clone()])
}

/// Identity commitment: Poseidon([secret]).
pub fn identity_commitment(env: &Env, secret: &U256) -> U256 {
    poseidon(env, &soroban_sdk::vec![env, secret.clone()])
}

/// Keccak-256 of `bytes` as a big-endian U256.
pub fn keccak_u256(env: &Env, bytes: &Bytes) -> U256 {
    let digest: BytesN<32> = env.crypto().keccak256(bytes).into();
    U256::from_be_bytes(env, &Bytes::from(digest))
}

/// Public signal hash: keccak256(signal) >> 8, always below the field modulus.
pub fn signal_hash(env: &Env, signal: &BytesN<32>) -> U256 {
    keccak_u256(env, &Bytes::from(signal.clone())).shr(8)
}

/// Group id: keccak256(provider || tier) mod r.
pub fn group_id(env: &Env, provider: &BytesN<32>, tier: &BytesN<32>) -> U256 {
    let mut preimage = Bytes::from(provider.clone());
    preimage.append(&Bytes::from(tier.clone()));
    keccak_u256(env, &preimage).rem_euclid(&field_modulus(env))
}

/// Left-aligned, zero-padded 32-byte encoding of a short string.
/// Input longer than 32 bytes is truncated.
pub fn bytes32(env: &Env, s: &str) -> BytesN<32> {
    let mut out = [0u8; 32];
    let src = s.as_bytes();
    let n = if src.len() < 32 { src.len() } else { 32 };
    out[..n].copy_from_slice(&src[..n]);
    BytesN::from_array(env, &out)
}

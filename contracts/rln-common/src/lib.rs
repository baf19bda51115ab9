//! # RLN Common
//!
//! Primitives shared by the RLN membership contracts:
//!
//! - [`hasher`]: the hash oracle (Poseidon for tree nodes and identity
//!   commitments, Keccak-256 for group ids and signal hashes).
//! - [`groth16`]: Groth16 proof and verification key types and the BN254
//!   pairing check.
//! - [`types`]: contract value types exchanged between contracts.
//!
//! Contract crates never depend on each other (each one exports its own wasm
//! entry points), so anything two contracts must agree on lives here.
//!
//! ## BN254 scalar field
//! r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//!
//! Identity commitments, secrets, tree nodes, group roots and every public
//! signal are elements of this field and must be strictly below `r`.

#![no_std]

pub mod groth16;
pub mod hasher;
pub mod types;

pub use groth16::{verify_groth16, Groth16Error, Proof, VerificationKey};
pub use types::{Group, GroupRef, GroupUpdate, TreeId, VerifierBinding};

use soroban_sdk::{Bytes, Env, U256};

/// BN254 scalar field modulus (Fr) in big-endian bytes
pub const BN254_FR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Deepest tree any contract in the workspace accepts (2^20 = 1,048,576 slots).
pub const MAX_TREE_DEPTH: u32 = 20;

/// The scalar field modulus as a `U256`.
pub fn field_modulus(env: &Env) -> U256 {
    U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_FR_MODULUS))
}

/// Check if a U256 value is within the BN254 scalar field (< r)
pub fn is_in_field(env: &Env, value: &U256) -> bool {
    value < &field_modulus(env)
}

/// A usable tree leaf: inside the field and not the zero tombstone.
pub fn is_valid_leaf(env: &Env, value: &U256) -> bool {
    value != &U256::from_u32(env, 0) && is_in_field(env, value)
}

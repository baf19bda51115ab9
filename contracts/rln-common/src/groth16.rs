//! Groth16 verification over BN254 (alt_bn128) using Soroban host functions.
//!
//! ### Groth16 SNARK
//! - **Paper**: "On the Size of Pairing-based Non-interactive Arguments" by Jens Groth (2016)
//! - **Equation**: e(-A, B) * e(alpha, beta) * e(vk_x, gamma) * e(C, delta) = 1
//!   with vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
//!
//! The RLN registration circuit exposes four public signals in this order:
//! `[root, nullifier_hash, signal_hash, external_nullifier]`.

#[cfg(not(any(test, feature = "testutils")))]
use soroban_sdk::crypto::bn254::{Fr, G1Affine, G2Affine};
use soroban_sdk::{contracterror, contracttype, BytesN, Env, Vec, U256};

use crate::is_in_field;

/// BN254 scalar field order minus one (r - 1) in big-endian bytes
/// Used for G1 point negation: (r-1) * P = -P since (r-1) ≡ -1 (mod r)
#[allow(dead_code)]
const BN254_R_MINUS_ONE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x00,
];

/// Number of public signals of the RLN registration circuit.
pub const RLN_PUBLIC_SIGNALS: u32 = 4;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Groth16Error {
    /// IC vector length doesn't match public signals + 1
    IcLengthMismatch = 30,
    /// Public signal value >= BN254 scalar field modulus (invalid field element)
    SignalNotInField = 31,
    /// Nullifier is zero (invalid)
    InvalidNullifier = 32,
}

/// Groth16 Verification Key for BN254
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationKey {
    pub alpha: BytesN<64>,   // G1 point
    pub beta: BytesN<128>,   // G2 point
    pub gamma: BytesN<128>,  // G2 point
    pub delta: BytesN<128>,  // G2 point
    pub ic: Vec<BytesN<64>>, // IC points (G1)
}

/// Groth16 Proof
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proof {
    pub a: BytesN<64>,  // G1 point
    pub b: BytesN<128>, // G2 point
    pub c: BytesN<64>,  // G1 point
}

impl VerificationKey {
    /// Number of public signals this key verifies.
    pub fn signal_count(&self) -> u32 {
        self.ic.len().saturating_sub(1)
    }
}

/// Validate that a U256 value is within the BN254 scalar field (< r)
///
/// Values >= r would be reduced mod r inside the pairing, so two different
/// U256 encodings could verify identically. Every public signal must pass
/// this check before use.
pub fn assert_in_field(env: &Env, value: &U256) -> Result<(), Groth16Error> {
    if !is_in_field(env, value) {
        return Err(Groth16Error::SignalNotInField);
    }
    Ok(())
}

/// Validate that a nullifier is non-zero and within the BN254 scalar field.
pub fn validate_nullifier(env: &Env, nullifier: &U256) -> Result<(), Groth16Error> {
    if nullifier == &U256::from_u32(env, 0) {
        return Err(Groth16Error::InvalidNullifier);
    }
    assert_in_field(env, nullifier)
}

/// Check the shape of a verification request without touching the curve:
/// IC length must be `signals + 1` and every signal must be a field element.
pub fn check_signals(
    env: &Env,
    vk: &VerificationKey,
    pub_signals: &Vec<U256>,
) -> Result<(), Groth16Error> {
    if pub_signals.len() + 1 != vk.ic.len() {
        return Err(Groth16Error::IcLengthMismatch);
    }
    for signal in pub_signals.iter() {
        assert_in_field(env, &signal)?;
    }
    Ok(())
}

/// Verify a Groth16 proof using the BN254 pairing check.
///
/// Returns `false` for malformed requests (see [`check_signals`]) instead of
/// failing, so callers can treat every non-`true` outcome as a rejection.
///
/// # Test Mode
/// In test mode (cfg(test) or feature="testutils"), the pairing check is
/// skipped once the request is well-formed, so contracts can be exercised
/// without circuit artifacts.
#[allow(unused_variables)]
pub fn verify_groth16(
    env: &Env,
    vk: &VerificationKey,
    proof: &Proof,
    pub_signals: &Vec<U256>,
) -> bool {
    if check_signals(env, vk, pub_signals).is_err() {
        return false;
    }

    #[cfg(any(test, feature = "testutils"))]
    {
        return true;
    }

    #[cfg(not(any(test, feature = "testutils")))]
    {
        let vk_x = compute_vk_x(vk, pub_signals);

        // (r-1) * A = -A
        let a_point = G1Affine::from_bytes(proof.a.clone());
        let neg_a = a_point * neg_one_scalar(env);

        let mut g1_vec = Vec::new(env);
        g1_vec.push_back(neg_a);
        g1_vec.push_back(G1Affine::from_bytes(vk.alpha.clone()));
        g1_vec.push_back(G1Affine::from_bytes(vk_x));
        g1_vec.push_back(G1Affine::from_bytes(proof.c.clone()));

        let mut g2_vec = Vec::new(env);
        g2_vec.push_back(G2Affine::from_bytes(proof.b.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.beta.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.gamma.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.delta.clone()));

        env.crypto().bn254().pairing_check(g1_vec, g2_vec)
    }
}

#[cfg(not(any(test, feature = "testutils")))]
fn neg_one_scalar(env: &Env) -> Fr {
    let bytes = soroban_sdk::Bytes::from_array(env, &BN254_R_MINUS_ONE);
    Fr::from(U256::from_be_bytes(env, &bytes))
}

/// vk_x = IC[0] + sum(pub_signals[i] * IC[i+1]); lengths were checked by the caller.
#[cfg(not(any(test, feature = "testutils")))]
fn compute_vk_x(vk: &VerificationKey, pub_signals: &Vec<U256>) -> BytesN<64> {
    let mut vk_x = G1Affine::from_bytes(vk.ic.get_unchecked(0));

    for (i, signal) in pub_signals.iter().enumerate() {
        let ic_point = G1Affine::from_bytes(vk.ic.get_unchecked(i as u32 + 1));
        vk_x = vk_x + ic_point * Fr::from(signal);
    }

    vk_x.to_bytes()
}

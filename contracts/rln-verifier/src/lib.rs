//! # RLN Proof Verifier
//!
//! Holds one Groth16 verification key for the RLN registration circuit of a
//! given tree depth and answers `verify(public_signals, proof) -> bool`.
//!
//! The group catalog binds one verifier contract per supported depth; the
//! registry calls it through `try_invoke_contract` and treats anything but a
//! clean `true` as a rejected proof.
//!
//! ## Public Signals
//! [root, nullifierHash, signalHash, externalNullifier] - 4 signals

#![no_std]
use rln_common::{groth16::RLN_PUBLIC_SIGNALS, verify_groth16, Proof, VerificationKey};
use soroban_sdk::{
    contract, contracterror, contractimpl, panic_with_error, symbol_short, Env, Symbol, Vec, U256,
};

const VK_KEY: Symbol = symbol_short!("vk");
const DEPTH_KEY: Symbol = symbol_short!("depth");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

const MAX_VERIFIER_DEPTH: u32 = 32;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VerifierError {
    InvalidVerificationKey = 50,
    InvalidDepth = 51,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct RlnVerifier;

#[contractimpl]
impl RlnVerifier {
    pub fn __constructor(env: Env, vk: VerificationKey, depth: u32) {
        // IC[0] plus one point per public signal of the registration circuit
        if vk.ic.len() != RLN_PUBLIC_SIGNALS + 1 {
            panic_with_error!(&env, VerifierError::InvalidVerificationKey);
        }
        if depth == 0 || depth > MAX_VERIFIER_DEPTH {
            panic_with_error!(&env, VerifierError::InvalidDepth);
        }

        env.storage().instance().set(&VK_KEY, &vk);
        env.storage().instance().set(&DEPTH_KEY, &depth);
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);
    }

    /// Check a proof against the stored key.
    ///
    /// Fails closed: a signal count that does not match the key, or any signal
    /// outside the scalar field, yields `false` rather than an error.
    pub fn verify(env: Env, public_signals: Vec<U256>, proof: Proof) -> bool {
        let vk = Self::verification_key(env.clone());
        verify_groth16(&env, &vk, &proof, &public_signals)
    }

    /// Tree depth this key was generated for
    pub fn depth(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&DEPTH_KEY)
            .unwrap_or_else(|| panic_with_error!(&env, VerifierError::InvalidDepth))
    }

    pub fn signal_count(env: Env) -> u32 {
        Self::verification_key(env).signal_count()
    }

    pub fn verification_key(env: Env) -> VerificationKey {
        env.storage()
            .instance()
            .get(&VK_KEY)
            .unwrap_or_else(|| panic_with_error!(&env, VerifierError::InvalidVerificationKey))
    }

    /// Contract version
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }
}

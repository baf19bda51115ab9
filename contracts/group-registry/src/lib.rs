//! # Group Registry
//!
//! Catalog of identity-provider groups (`provider`/`tier` pairs). A single
//! trusted updater publishes the latest Merkle root and depth of each group;
//! only that latest root is authoritative.
//!
//! The catalog also binds one proof verifier contract per tree depth. A group
//! can only be published at a depth that has a verifier.

#![no_std]
use rln_common::{hasher, is_in_field, Group, GroupUpdate, VerifierBinding};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    Address, BytesN, Env, Symbol, Vec, U256,
};

const UPDATER: Symbol = symbol_short!("updater");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GroupError {
    Unauthorized = 60,
    UnknownGroup = 61,
    InvalidGroup = 62,
    InvalidRoot = 63,
    UnsupportedDepth = 64,
    AlreadyInitialized = 65,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Group(U256),    // group_id -> Group
    Verifier(u32),  // depth -> verifier contract
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct GroupUpdatedEvent {
    #[topic]
    pub group_id: U256,
    pub root: U256,
    pub depth: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct UpdaterXferEvent {
    pub old_updater: Address,
    pub new_updater: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct GroupRegistry;

#[contractimpl]
impl GroupRegistry {
    /// Constructor: trusted updater and the verifier bound to each supported depth.
    /// Each verifier must report the depth it is bound to.
    pub fn __constructor(env: Env, updater: Address, verifiers: Vec<VerifierBinding>) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, GroupError::AlreadyInitialized);
        }

        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&UPDATER, &updater);
        for binding in verifiers.iter() {
            // The verifier's key must be the one generated for this depth
            let key_depth: u32 = env.invoke_contract(
                &binding.verifier,
                &symbol_short!("depth"),
                Vec::new(&env),
            );
            if key_depth != binding.depth {
                panic_with_error!(&env, GroupError::UnsupportedDepth);
            }
            env.storage()
                .persistent()
                .set(&DataKey::Verifier(binding.depth), &binding.verifier);
        }
    }

    /// Publish new roots. Each entry replaces root and depth of its group.
    /// The whole batch is rejected if any entry is invalid.
    pub fn update_groups(env: Env, updater: Address, entries: Vec<GroupUpdate>) {
        updater.require_auth();
        if updater != Self::updater(env.clone()) {
            panic_with_error!(&env, GroupError::Unauthorized);
        }

        for entry in entries.iter() {
            if !is_in_field(&env, &entry.root) {
                panic_with_error!(&env, GroupError::InvalidRoot);
            }
            if !env
                .storage()
                .persistent()
                .has(&DataKey::Verifier(entry.depth))
            {
                panic_with_error!(&env, GroupError::UnsupportedDepth);
            }

            let group_id = hasher::group_id(&env, &entry.provider, &entry.tier);
            let group = Group {
                provider: entry.provider,
                tier: entry.tier,
                root: entry.root.clone(),
                depth: entry.depth,
            };
            env.storage()
                .persistent()
                .set(&DataKey::Group(group_id.clone()), &group);

            GroupUpdatedEvent {
                group_id,
                root: entry.root,
                depth: entry.depth,
            }
            .publish(&env);
        }

        log!(&env, "groups updated: {}", entries.len());
    }

    /// Latest root of a group
    pub fn current_root(env: Env, group_id: U256) -> U256 {
        Self::group(env, group_id).root
    }

    pub fn get_group(env: Env, group_id: U256) -> Option<Group> {
        env.storage().persistent().get(&DataKey::Group(group_id))
    }

    pub fn group(env: Env, group_id: U256) -> Group {
        env.storage()
            .persistent()
            .get(&DataKey::Group(group_id))
            .unwrap_or_else(|| panic_with_error!(&env, GroupError::UnknownGroup))
    }

    pub fn has_group(env: Env, group_id: U256) -> bool {
        env.storage().persistent().has(&DataKey::Group(group_id))
    }

    /// keccak256(provider || tier) mod r
    pub fn group_id(env: Env, provider: BytesN<32>, tier: BytesN<32>) -> U256 {
        hasher::group_id(&env, &provider, &tier)
    }

    /// Verifier contract bound to `depth`, if any
    pub fn verifier(env: Env, depth: u32) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Verifier(depth))
    }

    pub fn updater(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&UPDATER)
            .unwrap_or_else(|| panic_with_error!(&env, GroupError::Unauthorized))
    }

    /// Hand the updater role to another address (current updater only)
    pub fn set_updater(env: Env, updater: Address, new_updater: Address) {
        updater.require_auth();
        let old_updater = Self::updater(env.clone());
        if updater != old_updater {
            panic_with_error!(&env, GroupError::Unauthorized);
        }

        env.storage().instance().set(&UPDATER, &new_updater);

        UpdaterXferEvent {
            old_updater,
            new_updater,
        }
        .publish(&env);
    }

    /// Contract version
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }
}

//! # Valid Groups
//!
//! Immutable subset of the group catalog that a registry accepts for
//! proof-gated registration. The set is fixed at deployment; root, group and
//! verifier lookups are forwarded to the catalog so the registry needs a
//! single overlay address.

#![no_std]
use rln_common::{hasher, Group, GroupRef};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, Address,
    Env, IntoVal, Symbol, Vec, U256,
};

const CATALOG: Symbol = symbol_short!("catalog");
const GROUPS: Symbol = symbol_short!("groups");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ValidGroupsError {
    InvalidGroup = 62,
    AlreadyInitialized = 65,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Valid(U256), // group_id -> true
}

#[contract]
pub struct ValidGroups;

#[contractimpl]
impl ValidGroups {
    /// Every group must already be published in `catalog`.
    pub fn __constructor(env: Env, catalog: Address, groups: Vec<GroupRef>) {
        if env.storage().instance().has(&CATALOG) {
            panic_with_error!(&env, ValidGroupsError::AlreadyInitialized);
        }

        let mut ids = Vec::new(&env);
        for group in groups.iter() {
            let group_id = hasher::group_id(&env, &group.provider, &group.tier);
            let known: bool = env.invoke_contract(
                &catalog,
                &Symbol::new(&env, "has_group"),
                soroban_sdk::vec![&env, group_id.into_val(&env)],
            );
            if !known {
                panic_with_error!(&env, ValidGroupsError::InvalidGroup);
            }

            env.storage()
                .instance()
                .set(&DataKey::Valid(group_id.clone()), &true);
            ids.push_back(group_id);
        }

        env.storage().instance().set(&CATALOG, &catalog);
        env.storage().instance().set(&GROUPS, &ids);
    }

    pub fn is_valid_group(env: Env, group_id: U256) -> bool {
        env.storage().instance().has(&DataKey::Valid(group_id))
    }

    /// Group ids in deployment order
    pub fn valid_groups(env: Env) -> Vec<U256> {
        env.storage()
            .instance()
            .get(&GROUPS)
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn catalog(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&CATALOG)
            .unwrap_or_else(|| panic_with_error!(&env, ValidGroupsError::InvalidGroup))
    }

    pub fn current_root(env: Env, group_id: U256) -> U256 {
        let catalog = Self::catalog(env.clone());
        env.invoke_contract(
            &catalog,
            &Symbol::new(&env, "current_root"),
            soroban_sdk::vec![&env, group_id.into_val(&env)],
        )
    }

    pub fn get_group(env: Env, group_id: U256) -> Option<Group> {
        let catalog = Self::catalog(env.clone());
        env.invoke_contract(
            &catalog,
            &Symbol::new(&env, "get_group"),
            soroban_sdk::vec![&env, group_id.into_val(&env)],
        )
    }

    pub fn verifier(env: Env, depth: u32) -> Option<Address> {
        let catalog = Self::catalog(env.clone());
        env.invoke_contract(
            &catalog,
            &symbol_short!("verifier"),
            soroban_sdk::vec![&env, depth.into_val(&env)],
        )
    }
}

//! Storage directory: the ordered list of membership trees a registry writes
//! to, plus the pointer to the one currently receiving registrations.
//!
//! Trees have a fixed capacity (the depth is baked into the circuit), so the
//! registry grows by appending a fresh tree instead of resizing one. Older
//! trees stay in the directory and keep serving withdrawals and slashes.

use rln_common::TreeId;
use soroban_sdk::{
    contracttype, log, panic_with_error, symbol_short, Address, Env, IntoVal, Symbol, U256,
};

use crate::{DataKey, RegistryConfig, RegistryError};

const CURRENT_STORAGE: Symbol = symbol_short!("cur_stor");
const STORAGE_COUNT: Symbol = symbol_short!("stor_cnt");

/// Storage indexes live in a 16-bit space.
pub const MAX_STORAGE_INDEX: u32 = u16::MAX as u32;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageEntry {
    pub storage_index: u32,
    pub tree: Address,
    pub tree_id: TreeId,
    pub depth: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct StorageAllocated {
    #[topic]
    pub storage_index: u32,
    pub tree: Address,
    pub depth: u32,
}

/// Initialize tree `expected_index` and make it the write target.
///
/// `expected_index` must equal the number of storages already allocated, so
/// a retried call fails instead of allocating a second tree.
pub fn allocate(env: &Env, config: &RegistryConfig, expected_index: u32) -> StorageEntry {
    let index = count(env);
    if expected_index != index {
        panic_with_error!(env, RegistryError::StorageIndexMismatch);
    }
    if index > MAX_STORAGE_INDEX {
        panic_with_error!(env, RegistryError::StorageExhausted);
    }

    let tree_id = TreeId {
        owner: env.current_contract_address(),
        index,
    };
    env.invoke_contract::<()>(
        &config.tree,
        &Symbol::new(env, "init_tree"),
        soroban_sdk::vec![env, tree_id.into_val(env), config.depth.into_val(env)],
    );

    let entry = StorageEntry {
        storage_index: index,
        tree: config.tree.clone(),
        tree_id,
        depth: config.depth,
    };
    env.storage()
        .persistent()
        .set(&DataKey::Storage(index), &entry);
    env.storage().instance().set(&CURRENT_STORAGE, &index);
    env.storage().instance().set(&STORAGE_COUNT, &(index + 1));

    log!(env, "storage allocated: {}", index);

    StorageAllocated {
        storage_index: index,
        tree: entry.tree.clone(),
        depth: entry.depth,
    }
    .publish(env);

    entry
}

pub fn current(env: &Env) -> StorageEntry {
    let index: u32 = env
        .storage()
        .instance()
        .get(&CURRENT_STORAGE)
        .unwrap_or_else(|| panic_with_error!(env, RegistryError::UnknownStorage));
    get(env, index)
}

pub fn get(env: &Env, index: u32) -> StorageEntry {
    env.storage()
        .persistent()
        .get(&DataKey::Storage(index))
        .unwrap_or_else(|| panic_with_error!(env, RegistryError::UnknownStorage))
}

pub fn count(env: &Env) -> u32 {
    env.storage().instance().get(&STORAGE_COUNT).unwrap_or(0)
}

/// Leaves used so far in the storage's tree
pub fn next_index(env: &Env, entry: &StorageEntry) -> u32 {
    let (_depth, next_index, _root): (u32, u32, U256) = env.invoke_contract(
        &entry.tree,
        &Symbol::new(env, "tree_info"),
        soroban_sdk::vec![env, entry.tree_id.into_val(env)],
    );
    next_index
}

pub fn is_full(env: &Env, entry: &StorageEntry) -> bool {
    next_index(env, entry) >= 1u32 << entry.depth
}

pub fn insert(env: &Env, entry: &StorageEntry, leaf: &U256) -> u32 {
    env.invoke_contract(
        &entry.tree,
        &symbol_short!("insert"),
        soroban_sdk::vec![env, entry.tree_id.into_val(env), leaf.into_val(env)],
    )
}

pub fn remove(env: &Env, entry: &StorageEntry, index: u32) {
    env.invoke_contract::<()>(
        &entry.tree,
        &symbol_short!("remove"),
        soroban_sdk::vec![env, entry.tree_id.into_val(env), index.into_val(env)],
    );
}

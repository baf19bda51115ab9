#![no_std]
use rln_common::{hasher, is_valid_leaf, TreeId, MAX_TREE_DEPTH};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, Env,
    Symbol, Vec, U256,
};

const MAX_ROOTS: u32 = 30;
const ZEROS_CACHE: Symbol = symbol_short!("zeros");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TreeError {
    NotInitialized = 40,
    AlreadyInitialized = 41,
    InvalidDepth = 42,
    CapacityExceeded = 43,
    InvalidIndex = 44,
    InvalidLeaf = 45,
    Unauthorized = 46,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeState {
    pub depth: u32,
    pub next_index: u32,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Tree(TreeId),              // tree -> TreeState
    Roots(TreeId),             // tree -> Vec<U256> (history, oldest first)
    Node(TreeId, u32, u32),    // (tree, level, index) -> hash; absent means zero of that level
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct TreeInitEvent {
    #[topic]
    pub tree: TreeId,
    pub depth: u32,
    pub empty_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeafInsertedEvent {
    #[topic]
    pub tree: TreeId,
    pub leaf: U256,
    pub index: u32,
    pub new_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeafRemovedEvent {
    #[topic]
    pub tree: TreeId,
    pub index: u32,
    pub new_root: U256,
}

/// Incremental Poseidon Merkle trees, one per `TreeId`.
///
/// Only nodes that differ from the zero subtree of their level are stored,
/// so insert and remove touch exactly `depth` nodes.
#[contract]
pub struct MembershipTree;

#[contractimpl]
impl MembershipTree {
    /// Constructor: pre-computes the zeros cache so the first tree
    /// operation does not pay for it.
    pub fn __constructor(env: Env) {
        Self::ensure_zeros_cache(&env);
    }

    /// Create an empty tree. The owner named in `tree` must authorize.
    pub fn init_tree(env: Env, tree: TreeId, depth: u32) {
        tree.owner.require_auth();

        if depth == 0 || depth > MAX_TREE_DEPTH {
            panic_with_error!(&env, TreeError::InvalidDepth);
        }

        let key = DataKey::Tree(tree.clone());
        if env.storage().persistent().has(&key) {
            panic_with_error!(&env, TreeError::AlreadyInitialized);
        }

        env.storage().persistent().set(
            &key,
            &TreeState {
                depth,
                next_index: 0,
            },
        );

        let empty_root = Self::zero_at_level(&env, depth);
        let mut roots = Vec::new(&env);
        roots.push_back(empty_root.clone());
        env.storage()
            .persistent()
            .set(&DataKey::Roots(tree.clone()), &roots);

        TreeInitEvent {
            tree,
            depth,
            empty_root,
        }
        .publish(&env);
    }

    /// Append a leaf at the next free index and return that index.
    pub fn insert(env: Env, tree: TreeId, leaf: U256) -> u32 {
        tree.owner.require_auth();

        let mut state = Self::load_state(&env, &tree);
        if !is_valid_leaf(&env, &leaf) {
            panic_with_error!(&env, TreeError::InvalidLeaf);
        }
        if state.next_index >= Self::capacity_of(state.depth) {
            panic_with_error!(&env, TreeError::CapacityExceeded);
        }

        let index = state.next_index;
        let new_root = Self::update_path(&env, &tree, state.depth, index, leaf.clone());

        state.next_index += 1;
        env.storage()
            .persistent()
            .set(&DataKey::Tree(tree.clone()), &state);

        LeafInsertedEvent {
            tree,
            leaf,
            index,
            new_root,
        }
        .publish(&env);

        index
    }

    /// Tombstone the leaf at `index`. The index is never handed out again.
    pub fn remove(env: Env, tree: TreeId, index: u32) {
        tree.owner.require_auth();

        let state = Self::load_state(&env, &tree);
        if index >= state.next_index || Self::node(&env, &tree, 0, index) == Self::zero(&env) {
            panic_with_error!(&env, TreeError::InvalidIndex);
        }

        let new_root = Self::update_path(&env, &tree, state.depth, index, Self::zero(&env));

        LeafRemovedEvent {
            tree,
            index,
            new_root,
        }
        .publish(&env);
    }

    /// Get current root of a tree
    pub fn current_root(env: Env, tree: TreeId) -> U256 {
        let roots = Self::load_roots(&env, &tree);
        match roots.last() {
            Some(root) => root,
            None => panic_with_error!(&env, TreeError::NotInitialized),
        }
    }

    /// Check if a root is in the recent root history (last 30 roots)
    pub fn root_ok(env: Env, tree: TreeId, root: U256) -> bool {
        let roots: Option<Vec<U256>> = env.storage().persistent().get(&DataKey::Roots(tree));
        match roots {
            Some(roots) => roots.contains(&root),
            None => false,
        }
    }

    /// (depth, next_index, current root)
    pub fn tree_info(env: Env, tree: TreeId) -> (u32, u32, U256) {
        let state = Self::load_state(&env, &tree);
        let root = Self::current_root(env, tree);
        (state.depth, state.next_index, root)
    }

    /// Maximum number of leaves (2^depth)
    pub fn capacity(env: Env, tree: TreeId) -> u32 {
        Self::capacity_of(Self::load_state(&env, &tree).depth)
    }

    /// Leaf value at `index`; zero once removed.
    pub fn get_leaf(env: Env, tree: TreeId, index: u32) -> U256 {
        let state = Self::load_state(&env, &tree);
        if index >= state.next_index {
            panic_with_error!(&env, TreeError::InvalidIndex);
        }
        Self::node(&env, &tree, 0, index)
    }

    /// Get Merkle path for a specific leaf index
    /// Returns (pathElements, pathIndices) where:
    /// - pathElements[i] is the sibling hash at level i
    /// - pathIndices[i] is 0 if the node is a left child, 1 if right child
    pub fn get_merkle_path(env: Env, tree: TreeId, index: u32) -> (Vec<U256>, Vec<u32>) {
        let state = Self::load_state(&env, &tree);
        if index >= state.next_index {
            panic_with_error!(&env, TreeError::InvalidIndex);
        }

        let mut path_elements = Vec::new(&env);
        let mut path_indices = Vec::new(&env);
        let mut current_index = index;

        for level in 0..state.depth {
            path_indices.push_back(current_index & 1);
            path_elements.push_back(Self::node(&env, &tree, level, current_index ^ 1));
            current_index >>= 1;
        }

        (path_elements, path_indices)
    }

    pub fn is_initialized(env: Env, tree: TreeId) -> bool {
        env.storage().persistent().has(&DataKey::Tree(tree))
    }

    // Internal: write `leaf` at `index` and rehash up to the root
    fn update_path(env: &Env, tree: &TreeId, depth: u32, index: u32, leaf: U256) -> U256 {
        let mut current_hash = leaf;
        let mut current_index = index;

        for level in 0..depth {
            Self::store_node(env, tree, level, current_index, &current_hash);

            let sibling = Self::node(env, tree, level, current_index ^ 1);
            current_hash = if current_index & 1 == 0 {
                hasher::hash_pair(env, &current_hash, &sibling)
            } else {
                hasher::hash_pair(env, &sibling, &current_hash)
            };
            current_index >>= 1;
        }

        Self::push_root(env, tree, current_hash.clone());
        current_hash
    }

    // Internal: root history with FIFO cap
    fn push_root(env: &Env, tree: &TreeId, root: U256) {
        let mut roots = Self::load_roots(env, tree);
        roots.push_back(root);
        if roots.len() > MAX_ROOTS {
            roots.pop_front();
        }
        env.storage()
            .persistent()
            .set(&DataKey::Roots(tree.clone()), &roots);
    }

    fn node(env: &Env, tree: &TreeId, level: u32, index: u32) -> U256 {
        env.storage()
            .persistent()
            .get(&DataKey::Node(tree.clone(), level, index))
            .unwrap_or_else(|| Self::zero_at_level(env, level))
    }

    fn store_node(env: &Env, tree: &TreeId, level: u32, index: u32, value: &U256) {
        let key = DataKey::Node(tree.clone(), level, index);
        if *value == Self::zero_at_level(env, level) {
            env.storage().persistent().remove(&key);
        } else {
            env.storage().persistent().set(&key, value);
        }
    }

    fn load_state(env: &Env, tree: &TreeId) -> TreeState {
        env.storage()
            .persistent()
            .get(&DataKey::Tree(tree.clone()))
            .unwrap_or_else(|| panic_with_error!(env, TreeError::NotInitialized))
    }

    fn load_roots(env: &Env, tree: &TreeId) -> Vec<U256> {
        env.storage()
            .persistent()
            .get(&DataKey::Roots(tree.clone()))
            .unwrap_or_else(|| panic_with_error!(env, TreeError::NotInitialized))
    }

    fn capacity_of(depth: u32) -> u32 {
        1u32 << depth
    }

    // Internal: Zero value (empty leaf)
    fn zero(env: &Env) -> U256 {
        U256::from_u32(env, 0)
    }

    // Internal: zeros[0] = 0, zeros[i+1] = Poseidon(zeros[i], zeros[i])
    fn ensure_zeros_cache(env: &Env) -> Vec<U256> {
        if let Some(zeros) = env.storage().instance().get(&ZEROS_CACHE) {
            return zeros;
        }

        let mut zeros = Vec::new(env);
        let mut current = Self::zero(env);
        zeros.push_back(current.clone());

        for _ in 0..MAX_TREE_DEPTH {
            current = hasher::hash_pair(env, &current, &current);
            zeros.push_back(current.clone());
        }

        env.storage().instance().set(&ZEROS_CACHE, &zeros);
        zeros
    }

    fn zero_at_level(env: &Env, level: u32) -> U256 {
        let zeros = Self::ensure_zeros_cache(env);
        zeros
            .get(level)
            .unwrap_or_else(|| panic_with_error!(env, TreeError::InvalidDepth))
    }
}

// Test-only functions in separate contractimpl block
// This prevents the macro from generating references to these functions in production builds
#[cfg(any(test, feature = "testutils"))]
#[contractimpl]
impl MembershipTree {
    /// Test helper: Expose Poseidon hash for KAT verification against circomlib
    pub fn test_poseidon_hash(env: Env, a: U256, b: U256) -> U256 {
        hasher::hash_pair(&env, &a, &b)
    }

    /// Test helper: Get zero value at specific tree level
    pub fn test_zero_at_level(env: Env, level: u32) -> U256 {
        Self::zero_at_level(&env, level)
    }
}

//! # RLN Membership Registry
//!
//! Lifecycle of RLN memberships: each membership is an identity commitment
//! `Poseidon([secret])` stored as a leaf of a membership tree, optionally
//! backed by a fixed token stake.
//!
//! - `register`: stake exactly `deposit` and append the commitment.
//! - `register_with_proof`: join without stake by proving membership of an
//!   accepted identity-provider group (Groth16 proof checked by the verifier
//!   bound to the group's tree depth).
//! - `withdraw`: reveal the secret, tombstone the leaf, recover the stake.
//! - `slash`: anyone holding a member's secret (leaked by signalling twice
//!   in one epoch) takes the stake.
//!
//! Every check, proof verification included, runs before the first write.
//! Slots move `Active -> Withdrawn | Slashed` and never come back; the first
//! release of a slot wins and any later one fails with `StakeAlreadyReleased`.
//!
//! ## Public Signals
//! [root, nullifierHash, signalHash, externalNullifier]
//! where signalHash = keccak256(signal) >> 8

#![no_std]
use rln_common::{
    groth16::validate_nullifier, hasher, is_in_field, is_valid_leaf, Group, Proof, MAX_TREE_DEPTH,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    Address, BytesN, Env, IntoVal, InvokeError, Symbol, Vec, U256,
};

pub mod directory;
mod stake;

pub use directory::StorageEntry;

const CONFIG: Symbol = symbol_short!("config");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RegistryError {
    AlreadyInitialized = 1,
    Unauthorized = 2,
    InsufficientStake = 3,
    ExcessStake = 4,
    DuplicateCommitment = 5,
    CapacityExceeded = 6,
    InvalidProof = 7,
    MemberNotFound = 8,
    StakeAlreadyReleased = 9,
    UnknownGroup = 10,
    InvalidGroup = 11,
    InvalidCommitment = 12,
    InvalidSecret = 13,
    ReceiverRequired = 14,
    NoStake = 15,
    NullifierAlreadyUsed = 16,
    GroupsNotConfigured = 17,
    UnsupportedDepth = 18,
    StorageIndexMismatch = 19,
    StorageExhausted = 20,
    UnknownStorage = 21,
    InvalidDeposit = 22,
    InvalidDepth = 23,
    NotInitialized = 24,
}

/// Deployment parameters, fixed for the life of the registry.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryConfig {
    /// Operator allowed to allocate new storages
    pub admin: Address,
    /// Stake token (use the Stellar Asset Contract for native stake)
    pub token: Address,
    /// Exact stake per membership
    pub deposit: i128,
    /// Membership tree contract hosting every storage
    pub tree: Address,
    /// Depth of each storage tree
    pub depth: u32,
    /// Valid-groups overlay; proof registration is disabled without it
    pub valid_groups: Option<Address>,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlotStatus {
    Active,
    Withdrawn,
    Slashed,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SlotId {
    pub storage_index: u32,
    pub index: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MembershipSlot {
    pub storage_index: u32,
    pub index: u32,
    pub commitment: U256,
    /// Stake still held for the slot; zero for proof-gated memberships
    /// and once the slot is withdrawn or slashed
    pub stake: i128,
    /// Funder of a staked registration
    pub owner_hint: Option<Address>,
    pub status: SlotStatus,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Storage(u32),       // storage_index -> StorageEntry
    Slot(SlotId),       // slot -> MembershipSlot
    Commitment(U256),   // commitment -> Vec<SlotId>, oldest first
    Nullifier(U256),    // nullifier_hash -> true once consumed
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProofVerified {
    #[topic]
    pub group_id: U256,
    pub signal: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRegistered {
    #[topic]
    pub commitment: U256,
    pub index: u32,
    pub storage_index: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct MemberWithdrawn {
    #[topic]
    pub commitment: U256,
    pub index: u32,
    pub storage_index: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct MemberSlashed {
    #[topic]
    pub commitment: U256,
    pub index: u32,
    pub storage_index: u32,
    pub receiver: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct RlnRegistry;

#[contractimpl]
impl RlnRegistry {
    /// Constructor: stores the configuration and allocates storage 0
    pub fn __constructor(env: Env, config: RegistryConfig) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, RegistryError::AlreadyInitialized);
        }
        if config.deposit <= 0 {
            panic_with_error!(&env, RegistryError::InvalidDeposit);
        }
        if config.depth == 0 || config.depth > MAX_TREE_DEPTH {
            panic_with_error!(&env, RegistryError::InvalidDepth);
        }

        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&CONFIG, &config);
        directory::allocate(&env, &config, 0);
    }

    /// Register a staked membership in the current storage.
    /// `stake` must equal the configured deposit exactly.
    pub fn register(env: Env, commitment: U256, stake: i128, funder: Address) -> u32 {
        funder.require_auth();

        let config = Self::config(env.clone());
        if stake < config.deposit {
            panic_with_error!(&env, RegistryError::InsufficientStake);
        }
        if stake > config.deposit {
            panic_with_error!(&env, RegistryError::ExcessStake);
        }
        let entry = Self::admission_target(&env, &commitment);

        stake::collect(&env, &config.token, &funder, config.deposit);
        Self::admit(&env, &entry, commitment, config.deposit, Some(funder))
    }

    /// Register without stake by proving membership of a valid group.
    ///
    /// The proof is checked against the group's current root, so a proof
    /// made for an older root stops verifying once the group is updated.
    pub fn register_with_proof(
        env: Env,
        group_id: U256,
        signal: BytesN<32>,
        nullifier_hash: U256,
        external_nullifier: U256,
        proof: Proof,
        commitment: U256,
    ) -> u32 {
        let config = Self::config(env.clone());
        let overlay = match config.valid_groups {
            Some(overlay) => overlay,
            None => panic_with_error!(&env, RegistryError::GroupsNotConfigured),
        };

        let valid: bool = env.invoke_contract(
            &overlay,
            &Symbol::new(&env, "is_valid_group"),
            soroban_sdk::vec![&env, group_id.into_val(&env)],
        );
        if !valid {
            panic_with_error!(&env, RegistryError::InvalidGroup);
        }

        let group: Option<Group> = env.invoke_contract(
            &overlay,
            &Symbol::new(&env, "get_group"),
            soroban_sdk::vec![&env, group_id.into_val(&env)],
        );
        let group = match group {
            Some(group) => group,
            None => panic_with_error!(&env, RegistryError::UnknownGroup),
        };

        let verifier: Option<Address> = env.invoke_contract(
            &overlay,
            &symbol_short!("verifier"),
            soroban_sdk::vec![&env, group.depth.into_val(&env)],
        );
        let verifier = match verifier {
            Some(verifier) => verifier,
            None => panic_with_error!(&env, RegistryError::UnsupportedDepth),
        };

        if validate_nullifier(&env, &nullifier_hash).is_err()
            || !is_in_field(&env, &external_nullifier)
        {
            panic_with_error!(&env, RegistryError::InvalidProof);
        }

        let mut pub_signals = Vec::new(&env);
        pub_signals.push_back(group.root);
        pub_signals.push_back(nullifier_hash.clone());
        pub_signals.push_back(hasher::signal_hash(&env, &signal));
        pub_signals.push_back(external_nullifier);

        let verified = env.try_invoke_contract::<bool, InvokeError>(
            &verifier,
            &symbol_short!("verify"),
            soroban_sdk::vec![&env, pub_signals.into_val(&env), proof.into_val(&env)],
        );
        if !matches!(verified, Ok(Ok(true))) {
            panic_with_error!(&env, RegistryError::InvalidProof);
        }

        let nullifier_key = DataKey::Nullifier(nullifier_hash);
        if env.storage().persistent().has(&nullifier_key) {
            panic_with_error!(&env, RegistryError::NullifierAlreadyUsed);
        }
        let entry = Self::admission_target(&env, &commitment);

        env.storage().persistent().set(&nullifier_key, &true);
        ProofVerified { group_id, signal }.publish(&env);

        Self::admit(&env, &entry, commitment, 0, None)
    }

    /// Withdraw a membership by revealing its secret.
    ///
    /// `slot` picks a specific membership when the commitment was registered
    /// more than once. A staked membership pays out to `receiver`, which is
    /// required; a stakeless one must not name a receiver.
    pub fn withdraw(env: Env, secret: U256, slot: Option<SlotId>, receiver: Option<Address>) {
        if !is_in_field(&env, &secret) {
            panic_with_error!(&env, RegistryError::InvalidSecret);
        }
        let commitment = hasher::identity_commitment(&env, &secret);
        let (slot_id, mut record) = Self::locate(&env, &commitment, slot);

        let receiver = match (record.stake > 0, receiver) {
            (true, None) => panic_with_error!(&env, RegistryError::ReceiverRequired),
            (false, Some(_)) => panic_with_error!(&env, RegistryError::NoStake),
            (_, receiver) => receiver,
        };

        let entry = directory::get(&env, record.storage_index);
        directory::remove(&env, &entry, record.index);

        if let Some(receiver) = receiver {
            let config = Self::config(env.clone());
            stake::release(&env, &config.token, &receiver, record.stake);
        }

        record.stake = 0;
        record.status = SlotStatus::Withdrawn;
        env.storage()
            .persistent()
            .set(&DataKey::Slot(slot_id), &record);

        MemberWithdrawn {
            commitment,
            index: record.index,
            storage_index: record.storage_index,
        }
        .publish(&env);
    }

    /// Slash a member whose secret leaked through a double signal.
    ///
    /// `secret` is the evidence: it is recovered off-chain from two shares
    /// carrying the same nullifier and must hash to `commitment`.
    pub fn slash(env: Env, commitment: U256, receiver: Address, secret: U256) {
        if !is_in_field(&env, &secret) || hasher::identity_commitment(&env, &secret) != commitment
        {
            panic_with_error!(&env, RegistryError::InvalidProof);
        }

        let (slot_id, mut record) = Self::locate(&env, &commitment, None);
        if record.stake == 0 {
            panic_with_error!(&env, RegistryError::NoStake);
        }

        let entry = directory::get(&env, record.storage_index);
        directory::remove(&env, &entry, record.index);

        let config = Self::config(env.clone());
        stake::release(&env, &config.token, &receiver, record.stake);

        record.stake = 0;
        record.status = SlotStatus::Slashed;
        env.storage()
            .persistent()
            .set(&DataKey::Slot(slot_id), &record);

        log!(
            &env,
            "member slashed: storage {} index {}",
            record.storage_index,
            record.index
        );

        MemberSlashed {
            commitment,
            index: record.index,
            storage_index: record.storage_index,
            receiver,
        }
        .publish(&env);
    }

    /// Open the next storage and make it the registration target (admin only).
    /// `expected_index` must be the index the new storage will receive.
    pub fn allocate_new_storage(env: Env, admin: Address, expected_index: u32) -> u32 {
        admin.require_auth();
        let config = Self::config(env.clone());
        if admin != config.admin {
            panic_with_error!(&env, RegistryError::Unauthorized);
        }

        directory::allocate(&env, &config, expected_index).storage_index
    }

    pub fn current_storage(env: Env) -> StorageEntry {
        directory::current(&env)
    }

    pub fn storage(env: Env, index: u32) -> StorageEntry {
        directory::get(&env, index)
    }

    pub fn storage_count(env: Env) -> u32 {
        directory::count(&env)
    }

    pub fn config(env: Env) -> RegistryConfig {
        env.storage()
            .instance()
            .get(&CONFIG)
            .unwrap_or_else(|| panic_with_error!(&env, RegistryError::NotInitialized))
    }

    /// Required stake per membership
    pub fn deposit(env: Env) -> i128 {
        Self::config(env).deposit
    }

    pub fn slot(env: Env, slot: SlotId) -> Option<MembershipSlot> {
        env.storage().persistent().get(&DataKey::Slot(slot))
    }

    /// Most recent Active slot holding `commitment`
    pub fn active_slot(env: Env, commitment: U256) -> Option<SlotId> {
        let history = Self::history(&env, &commitment);
        let mut i = history.len();
        while i > 0 {
            i -= 1;
            let slot_id = history.get_unchecked(i);
            if let Some(record) = Self::slot(env.clone(), slot_id.clone()) {
                if record.status == SlotStatus::Active {
                    return Some(slot_id);
                }
            }
        }
        None
    }

    pub fn is_member(env: Env, commitment: U256) -> bool {
        Self::active_slot(env, commitment).is_some()
    }

    pub fn is_nullifier_used(env: Env, nullifier_hash: U256) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Nullifier(nullifier_hash))
    }

    /// Commitment a secret maps to, for checking a secret before revealing it
    pub fn commitment_of(env: Env, secret: U256) -> U256 {
        if !is_in_field(&env, &secret) {
            panic_with_error!(&env, RegistryError::InvalidSecret);
        }
        hasher::identity_commitment(&env, &secret)
    }

    /// Contract version
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal: checks shared by both registration paths; returns the target storage
    fn admission_target(env: &Env, commitment: &U256) -> StorageEntry {
        if !is_valid_leaf(env, commitment) {
            panic_with_error!(env, RegistryError::InvalidCommitment);
        }

        let entry = directory::current(env);
        if let Some(active) = Self::active_slot(env.clone(), commitment.clone()) {
            if active.storage_index == entry.storage_index {
                panic_with_error!(env, RegistryError::DuplicateCommitment);
            }
        }
        if directory::is_full(env, &entry) {
            panic_with_error!(env, RegistryError::CapacityExceeded);
        }
        entry
    }

    // Internal: insert the leaf and record the slot
    fn admit(
        env: &Env,
        entry: &StorageEntry,
        commitment: U256,
        stake: i128,
        owner_hint: Option<Address>,
    ) -> u32 {
        let index = directory::insert(env, entry, &commitment);

        let slot_id = SlotId {
            storage_index: entry.storage_index,
            index,
        };
        let record = MembershipSlot {
            storage_index: entry.storage_index,
            index,
            commitment: commitment.clone(),
            stake,
            owner_hint,
            status: SlotStatus::Active,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Slot(slot_id.clone()), &record);

        let mut history = Self::history(env, &commitment);
        history.push_back(slot_id);
        env.storage()
            .persistent()
            .set(&DataKey::Commitment(commitment.clone()), &history);

        MemberRegistered {
            commitment,
            index,
            storage_index: entry.storage_index,
        }
        .publish(env);

        index
    }

    // Internal: find the slot a release applies to
    fn locate(env: &Env, commitment: &U256, hint: Option<SlotId>) -> (SlotId, MembershipSlot) {
        let slot_id = match hint {
            Some(slot_id) => slot_id,
            None => match Self::active_slot(env.clone(), commitment.clone()) {
                Some(slot_id) => slot_id,
                None if Self::history(env, commitment).is_empty() => {
                    panic_with_error!(env, RegistryError::MemberNotFound)
                }
                None => panic_with_error!(env, RegistryError::StakeAlreadyReleased),
            },
        };

        let record = match Self::slot(env.clone(), slot_id.clone()) {
            Some(record) if record.commitment == *commitment => record,
            _ => panic_with_error!(env, RegistryError::MemberNotFound),
        };
        if record.status != SlotStatus::Active {
            panic_with_error!(env, RegistryError::StakeAlreadyReleased);
        }
        (slot_id, record)
    }

    fn history(env: &Env, commitment: &U256) -> Vec<SlotId> {
        env.storage()
            .persistent()
            .get(&DataKey::Commitment(commitment.clone()))
            .unwrap_or_else(|| Vec::new(env))
    }
}

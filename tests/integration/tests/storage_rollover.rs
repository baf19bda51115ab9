// Storage rollover: once the current tree is full the admin allocates the
// next one, registrations continue there and older storages keep serving
// withdrawals.

use soroban_sdk::{
    testutils::Address as _,
    token::{StellarAssetClient, TokenClient},
    Address, Env, U256,
};

use membership_tree::MembershipTreeClient;
use rln_common::{hasher, TreeId};
use rln_registry::{RegistryConfig, RegistryError, RlnRegistryClient, SlotId};

const DEPOSIT: i128 = 500;

struct Rollover {
    env: Env,
    admin: Address,
    member: Address,
    tree: Address,
    registry: Address,
    token: Address,
}

impl Rollover {
    /// Depth 1: two members per storage
    fn new() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        env.cost_estimate().budget().reset_unlimited();

        let admin = Address::generate(&env);
        let member = Address::generate(&env);
        let token = env
            .register_stellar_asset_contract_v2(admin.clone())
            .address();
        StellarAssetClient::new(&env, &token).mint(&member, &(DEPOSIT * 10));

        let tree = env.register(membership_tree::MembershipTree, ());
        let registry = env.register(
            rln_registry::RlnRegistry,
            (RegistryConfig {
                admin: admin.clone(),
                token: token.clone(),
                deposit: DEPOSIT,
                tree: tree.clone(),
                depth: 1,
                valid_groups: None,
            },),
        );

        Self {
            env,
            admin,
            member,
            tree,
            registry,
            token,
        }
    }

    fn registry(&self) -> RlnRegistryClient {
        RlnRegistryClient::new(&self.env, &self.registry)
    }

    fn tree(&self) -> MembershipTreeClient {
        MembershipTreeClient::new(&self.env, &self.tree)
    }

    fn storage(&self, index: u32) -> TreeId {
        TreeId {
            owner: self.registry.clone(),
            index,
        }
    }

    fn commitment(&self, secret: u32) -> U256 {
        hasher::identity_commitment(&self.env, &U256::from_u32(&self.env, secret))
    }

    fn register(&self, secret: u32) -> u32 {
        self.registry()
            .register(&self.commitment(secret), &DEPOSIT, &self.member)
    }
}

#[test]
fn test_rollover_keeps_old_storage_serving() {
    let s = Rollover::new();
    let receiver = Address::generate(&s.env);

    assert_eq!(s.register(1), 0);
    assert_eq!(s.register(2), 1);

    let full = s
        .registry()
        .try_register(&s.commitment(3), &DEPOSIT, &s.member);
    assert_eq!(full, Err(Ok(RegistryError::CapacityExceeded)));

    assert_eq!(s.registry().allocate_new_storage(&s.admin, &1), 1);
    assert_eq!(s.registry().storage_count(), 2);
    assert_eq!(s.registry().current_storage().storage_index, 1);
    assert_eq!(s.tree().capacity(&s.storage(1)), 2);

    // Indexes restart in the new storage
    assert_eq!(s.register(3), 0);
    assert_eq!(
        s.registry().active_slot(&s.commitment(3)),
        Some(SlotId {
            storage_index: 1,
            index: 0
        })
    );

    let old_root = s.tree().current_root(&s.storage(0));
    let new_root = s.tree().current_root(&s.storage(1));

    s.registry()
        .withdraw(&U256::from_u32(&s.env, 1), &None, &Some(receiver.clone()));

    assert_ne!(s.tree().current_root(&s.storage(0)), old_root);
    assert_eq!(s.tree().current_root(&s.storage(1)), new_root);
    assert_eq!(TokenClient::new(&s.env, &s.token).balance(&receiver), DEPOSIT);

    // Tombstoned slots are not reused, storage 0 stays full
    assert_eq!(s.tree().tree_info(&s.storage(0)).1, 2);
}

#[test]
fn test_same_commitment_in_two_storages() {
    let s = Rollover::new();
    let receiver = Address::generate(&s.env);

    s.register(7);
    s.register(8);
    s.registry().allocate_new_storage(&s.admin, &1);

    // Allowed once the earlier registration lives in an older storage
    assert_eq!(s.register(7), 0);

    let older = SlotId {
        storage_index: 0,
        index: 0,
    };
    s.registry().withdraw(
        &U256::from_u32(&s.env, 7),
        &Some(older.clone()),
        &Some(receiver.clone()),
    );

    assert!(s.registry().is_member(&s.commitment(7)));
    assert_eq!(
        s.registry().active_slot(&s.commitment(7)),
        Some(SlotId {
            storage_index: 1,
            index: 0
        })
    );
    assert_eq!(
        s.registry().try_withdraw(
            &U256::from_u32(&s.env, 7),
            &Some(older),
            &Some(receiver.clone())
        ),
        Err(Ok(RegistryError::StakeAlreadyReleased))
    );
}

#[test]
fn test_allocate_retry_is_rejected() {
    let s = Rollover::new();

    s.registry().allocate_new_storage(&s.admin, &1);
    let retry = s.registry().try_allocate_new_storage(&s.admin, &1);

    assert_eq!(retry, Err(Ok(RegistryError::StorageIndexMismatch)));
    assert_eq!(s.registry().storage_count(), 2);
}

#[test]
fn test_allocate_requires_admin() {
    let s = Rollover::new();
    let stranger = Address::generate(&s.env);

    let result = s.registry().try_allocate_new_storage(&stranger, &1);

    assert_eq!(result, Err(Ok(RegistryError::Unauthorized)));
    assert_eq!(s.registry().current_storage().storage_index, 0);
}

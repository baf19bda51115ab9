// Proof-gated registration for github/bronze.
//
// The group tree (two members) is built with the real membership tree
// contract so its root is a genuine Poseidon root. The verifier is a stand-in
// that accepts exactly one (public signals, proof) pair, which is what a
// Groth16 verifier does for a single valid proof.

use soroban_sdk::{
    testutils::Address as _, Address, BytesN, Env, Symbol, TryFromVal, Vec, U256,
};

use group_registry::GroupRegistryClient;
use membership_tree::MembershipTreeClient;
use rln_common::{
    hasher::{self, bytes32},
    GroupRef, GroupUpdate, Proof, TreeId, VerifierBinding,
};
use rln_registry::{RegistryConfig, RegistryError, RlnRegistryClient};

mod expected_proof_verifier {
    use rln_common::Proof;
    use soroban_sdk::{contract, contractimpl, symbol_short, Env, Symbol, Vec, U256};

    const SIGNALS: Symbol = symbol_short!("signals");
    const PROOF: Symbol = symbol_short!("proof");

    #[contract]
    pub struct ExpectedProofVerifier;

    #[contractimpl]
    impl ExpectedProofVerifier {
        pub fn expect(env: Env, public_signals: Vec<U256>, proof: Proof) {
            env.storage().instance().set(&SIGNALS, &public_signals);
            env.storage().instance().set(&PROOF, &proof);
        }

        pub fn depth() -> u32 {
            20
        }

        pub fn verify(env: Env, public_signals: Vec<U256>, proof: Proof) -> bool {
            let expected_signals: Option<Vec<U256>> = env.storage().instance().get(&SIGNALS);
            let expected_proof: Option<Proof> = env.storage().instance().get(&PROOF);
            expected_signals == Some(public_signals) && expected_proof == Some(proof)
        }
    }
}

struct Deployment {
    env: Env,
    updater: Address,
    group_tree: TreeId,
    tree: Address,
    catalog: Address,
    verifier: Address,
    registry: Address,
}

impl Deployment {
    fn new() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        env.cost_estimate().budget().reset_unlimited();

        let admin = Address::generate(&env);
        let updater = Address::generate(&env);
        let tree = env.register(membership_tree::MembershipTree, ());
        let verifier = env.register(expected_proof_verifier::ExpectedProofVerifier, ());
        let catalog = env.register(
            group_registry::GroupRegistry,
            (
                updater.clone(),
                soroban_sdk::vec![
                    &env,
                    VerifierBinding {
                        depth: 20,
                        verifier: verifier.clone(),
                    }
                ],
            ),
        );

        // Off-chain group tree maintained by the updater
        let group_tree = TreeId {
            owner: updater.clone(),
            index: 0,
        };
        let tree_client = MembershipTreeClient::new(&env, &tree);
        tree_client.init_tree(&group_tree, &20);
        for secret in [11u32, 22u32] {
            let leaf = hasher::identity_commitment(&env, &U256::from_u32(&env, secret));
            tree_client.insert(&group_tree, &leaf);
        }

        publish_root(&env, &catalog, &updater, &tree, &group_tree);

        let groups = env.register(
            valid_groups::ValidGroups,
            (
                catalog.clone(),
                soroban_sdk::vec![
                    &env,
                    GroupRef {
                        provider: bytes32(&env, "github"),
                        tier: bytes32(&env, "bronze"),
                    }
                ],
            ),
        );
        let token = env
            .register_stellar_asset_contract_v2(admin.clone())
            .address();
        let registry = env.register(
            rln_registry::RlnRegistry,
            (RegistryConfig {
                admin,
                token,
                deposit: 1_000_000_000_000_000,
                tree: tree.clone(),
                depth: 20,
                valid_groups: Some(groups),
            },),
        );

        Self {
            env,
            updater,
            group_tree,
            tree,
            catalog,
            verifier,
            registry,
        }
    }

    fn tree_client(&self) -> MembershipTreeClient {
        MembershipTreeClient::new(&self.env, &self.tree)
    }

    fn registry_client(&self) -> RlnRegistryClient {
        RlnRegistryClient::new(&self.env, &self.registry)
    }

    fn group_id(&self) -> U256 {
        hasher::group_id(
            &self.env,
            &bytes32(&self.env, "github"),
            &bytes32(&self.env, "bronze"),
        )
    }

    fn publish_root(&self) {
        publish_root(
            &self.env,
            &self.catalog,
            &self.updater,
            &self.tree,
            &self.group_tree,
        );
    }

    fn proof(&self) -> Proof {
        Proof {
            a: BytesN::from_array(&self.env, &[1u8; 64]),
            b: BytesN::from_array(&self.env, &[2u8; 128]),
            c: BytesN::from_array(&self.env, &[3u8; 64]),
        }
    }
}

/// Push the group tree's current root to the catalog
fn publish_root(
    env: &Env,
    catalog: &Address,
    updater: &Address,
    tree: &Address,
    group_tree: &TreeId,
) {
    let root = MembershipTreeClient::new(env, tree).current_root(group_tree);
    GroupRegistryClient::new(env, catalog).update_groups(
        updater,
        &soroban_sdk::vec![
            env,
            GroupUpdate {
                provider: bytes32(env, "github"),
                tier: bytes32(env, "bronze"),
                root,
                depth: 20,
            }
        ],
    );
}

#[test]
fn test_register_with_proof_then_replay_after_root_update() {
    let d = Deployment::new();
    let env = &d.env;

    let signal = bytes32(env, "foo");
    let nullifier_hash = U256::from_u32(env, 31337);
    let external_nullifier = U256::from_u32(env, 1);
    let commitment = hasher::identity_commitment(env, &U256::from_u32(env, 11));
    let root = d.tree_client().current_root(&d.group_tree);

    let mut signals = Vec::new(env);
    signals.push_back(root);
    signals.push_back(nullifier_hash.clone());
    signals.push_back(hasher::signal_hash(env, &signal));
    signals.push_back(external_nullifier.clone());
    expected_proof_verifier::ExpectedProofVerifierClient::new(env, &d.verifier)
        .expect(&signals, &d.proof());

    let index = d.registry_client().register_with_proof(
        &d.group_id(),
        &signal,
        &nullifier_hash,
        &external_nullifier,
        &d.proof(),
        &commitment,
    );
    assert_eq!(index, 0);

    // ProofVerified comes before MemberRegistered
    let mut names = std::vec::Vec::new();
    for event in env.events().all().iter() {
        if event.0 == d.registry {
            names.push(Symbol::try_from_val(env, &event.1.get(0).unwrap()).unwrap());
        }
    }
    assert_eq!(
        names,
        std::vec![
            Symbol::new(env, "proof_verified"),
            Symbol::new(env, "member_registered")
        ]
    );

    // A third member joins the group, the updater publishes the new root
    d.tree_client().insert(
        &d.group_tree,
        &hasher::identity_commitment(env, &U256::from_u32(env, 33)),
    );
    d.publish_root();

    let replay = d.registry_client().try_register_with_proof(
        &d.group_id(),
        &signal,
        &nullifier_hash,
        &external_nullifier,
        &d.proof(),
        &hasher::identity_commitment(env, &U256::from_u32(env, 22)),
    );
    assert_eq!(replay, Err(Ok(RegistryError::InvalidProof)));
}

#[test]
fn test_tampered_signal_rejected() {
    let d = Deployment::new();
    let env = &d.env;

    let root = d.tree_client().current_root(&d.group_tree);
    let mut signals = Vec::new(env);
    signals.push_back(root);
    signals.push_back(U256::from_u32(env, 5));
    signals.push_back(hasher::signal_hash(env, &bytes32(env, "foo")));
    signals.push_back(U256::from_u32(env, 1));
    expected_proof_verifier::ExpectedProofVerifierClient::new(env, &d.verifier)
        .expect(&signals, &d.proof());

    let result = d.registry_client().try_register_with_proof(
        &d.group_id(),
        &bytes32(env, "bar"),
        &U256::from_u32(env, 5),
        &U256::from_u32(env, 1),
        &d.proof(),
        &hasher::identity_commitment(env, &U256::from_u32(env, 11)),
    );

    assert_eq!(result, Err(Ok(RegistryError::InvalidProof)));
    assert!(!d.registry_client().is_nullifier_used(&U256::from_u32(env, 5)));
}

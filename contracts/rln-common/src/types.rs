use soroban_sdk::{contracttype, Address, BytesN, U256};

/// Handle of one tree inside the membership tree contract.
/// The owner is the only address allowed to mutate it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeId {
    pub owner: Address,
    pub index: u32,
}

/// A provider/tier group as held by the group catalog.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Group {
    pub provider: BytesN<32>,
    pub tier: BytesN<32>,
    pub root: U256,
    pub depth: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupRef {
    pub provider: BytesN<32>,
    pub tier: BytesN<32>,
}

/// One entry of a catalog update; replaces root and depth of the group.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupUpdate {
    pub provider: BytesN<32>,
    pub tier: BytesN<32>,
    pub root: U256,
    pub depth: u32,
}

/// Proof verifier contract responsible for trees of `depth`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifierBinding {
    pub depth: u32,
    pub verifier: Address,
}

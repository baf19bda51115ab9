//! Stake custody through a Soroban token contract.
//!
//! Native lumens are reached through their Stellar Asset Contract, so one
//! path covers both native and issued-token stake.

use soroban_sdk::{token::TokenClient, Address, Env};

/// Move `amount` from `from` into the registry.
pub fn collect(env: &Env, token: &Address, from: &Address, amount: i128) {
    TokenClient::new(env, token).transfer(from, &env.current_contract_address(), &amount);
}

/// Pay `amount` held by the registry out to `to`.
pub fn release(env: &Env, token: &Address, to: &Address, amount: i128) {
    if amount == 0 {
        return;
    }
    TokenClient::new(env, token).transfer(&env.current_contract_address(), to, &amount);
}

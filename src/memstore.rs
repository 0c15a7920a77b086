//! In-memory collaborators for tests, tooling and embedding
//!
//! Each store guards its maps with a `parking_lot::RwLock`, so every trait call
//! is atomic on its own. Multi-call sequences are not.

use crate::coins::Coins;
use crate::crypto::{address_to_hex, Address};
use crate::error::AdmissionError;
use crate::keepers::{
    AccountKeeper, AuthParams, BankKeeper, BaseAccount, FeegrantKeeper, GlobalFeeParamSource,
    GlobalFeeParams, RelayKeeper, ValidatorSet, ValidatorSnapshot,
};
use crate::transaction::{Msg, PacketId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<HashMap<Address, BaseAccount>>,
    params: RwLock<AuthParams>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: AuthParams) -> Self {
        InMemoryAccounts {
            accounts: RwLock::new(HashMap::new()),
            params: RwLock::new(params),
        }
    }

    pub fn set_params(&self, params: AuthParams) {
        *self.params.write() = params;
    }

    /// Creates an account with the next free account number, or returns the existing one.
    pub fn create_account(&self, address: Address) -> BaseAccount {
        let mut accounts = self.accounts.write();
        let next = accounts.len() as u64;
        accounts
            .entry(address)
            .or_insert_with(|| BaseAccount {
                address,
                pub_key: None,
                account_number: next,
                sequence: 0,
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl AccountKeeper for InMemoryAccounts {
    fn account(&self, addr: &Address) -> Option<BaseAccount> {
        self.accounts.read().get(addr).cloned()
    }

    fn set_account(&self, account: BaseAccount) {
        self.accounts.write().insert(account.address, account);
    }

    fn increment_sequence(&self, addr: &Address, expected: u64) -> Result<u64, AdmissionError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(addr).ok_or_else(|| {
            AdmissionError::UnknownAddress(format!(
                "account {} does not exist",
                address_to_hex(addr)
            ))
        })?;
        if account.sequence != expected {
            return Err(AdmissionError::WrongSequence {
                expected: account.sequence,
                got: expected,
            });
        }
        account.sequence = expected.checked_add(1).ok_or_else(|| {
            AdmissionError::Internal(format!("sequence overflow for {}", address_to_hex(addr)))
        })?;
        Ok(account.sequence)
    }

    fn params(&self) -> AuthParams {
        self.params.read().clone()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: RwLock<HashMap<Address, Coins>>,
    modules: RwLock<HashMap<String, Coins>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, addr: Address, coins: Coins) {
        self.balances.write().insert(addr, coins);
    }

    pub fn module_balance(&self, module: &str) -> Coins {
        self.modules.read().get(module).cloned().unwrap_or_default()
    }
}

impl BankKeeper for InMemoryBank {
    fn spendable_coins(&self, addr: &Address) -> Coins {
        self.balances.read().get(addr).cloned().unwrap_or_default()
    }

    fn send_coins_to_module(
        &self,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), AdmissionError> {
        let mut balances = self.balances.write();
        let current = balances.get(from).cloned().unwrap_or_default();
        let remaining = current.checked_sub(amount).map_err(|e| {
            AdmissionError::InsufficientFunds(format!(
                "{} cannot pay {}: {}",
                address_to_hex(from),
                amount,
                e
            ))
        })?;

        let mut modules = self.modules.write();
        let collected = modules.get(module).cloned().unwrap_or_default();
        let collected = collected.checked_add(amount)?;

        balances.insert(*from, remaining);
        modules.insert(module.to_string(), collected);
        Ok(())
    }
}

/// Spend-limit allowances keyed by `(granter, grantee)`.
#[derive(Debug, Default)]
pub struct InMemoryFeegrant {
    allowances: RwLock<HashMap<(Address, Address), Coins>>,
}

impl InMemoryFeegrant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, granter: Address, grantee: Address, spend_limit: Coins) {
        self.allowances
            .write()
            .insert((granter, grantee), spend_limit);
    }

    pub fn allowance(&self, granter: &Address, grantee: &Address) -> Option<Coins> {
        self.allowances.read().get(&(*granter, *grantee)).cloned()
    }
}

fn remaining_allowance(
    allowances: &HashMap<(Address, Address), Coins>,
    granter: &Address,
    grantee: &Address,
    fee: &Coins,
) -> Result<Coins, AdmissionError> {
    let limit = allowances
        .get(&(*granter, *grantee))
        .ok_or_else(|| AdmissionError::Unauthorized("fee-grant not found".to_string()))?;
    limit
        .checked_sub(fee)
        .map_err(|_| AdmissionError::InsufficientFee {
            got: limit.to_string(),
            required: fee.to_string(),
        })
}

impl FeegrantKeeper for InMemoryFeegrant {
    fn check_granted_fees(
        &self,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        _msgs: &[Msg],
    ) -> Result<(), AdmissionError> {
        remaining_allowance(&self.allowances.read(), granter, grantee, fee).map(|_| ())
    }

    fn use_granted_fees(
        &self,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        _msgs: &[Msg],
    ) -> Result<(), AdmissionError> {
        let mut allowances = self.allowances.write();
        let left = remaining_allowance(&allowances, granter, grantee, fee)?;
        allowances.insert((*granter, *grantee), left);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StaticValidatorSet {
    snapshot: RwLock<ValidatorSnapshot>,
}

impl StaticValidatorSet {
    pub fn new(snapshot: ValidatorSnapshot) -> Self {
        StaticValidatorSet {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn set_snapshot(&self, snapshot: ValidatorSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

impl ValidatorSet for StaticValidatorSet {
    fn snapshot(&self) -> ValidatorSnapshot {
        self.snapshot.read().clone()
    }
}

#[derive(Debug)]
pub struct InMemoryGlobalFeeParams {
    subspace: String,
    params: RwLock<Option<GlobalFeeParams>>,
}

impl InMemoryGlobalFeeParams {
    pub fn new(subspace: &str, params: Option<GlobalFeeParams>) -> Self {
        InMemoryGlobalFeeParams {
            subspace: subspace.to_string(),
            params: RwLock::new(params),
        }
    }

    /// Governance parameter change.
    pub fn set_params(&self, params: Option<GlobalFeeParams>) {
        *self.params.write() = params;
    }
}

impl GlobalFeeParamSource for InMemoryGlobalFeeParams {
    fn subspace_name(&self) -> &str {
        &self.subspace
    }

    fn params(&self) -> Option<GlobalFeeParams> {
        self.params.read().clone()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRelayStore {
    processed: RwLock<HashSet<PacketId>>,
    clients: RwLock<HashMap<String, bool>>,
}

impl InMemoryRelayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_processed(&self, packet: PacketId) {
        self.processed.write().insert(packet);
    }

    /// Clients default to accepting updates.
    pub fn set_client_valid(&self, client_id: &str, valid: bool) {
        self.clients.write().insert(client_id.to_string(), valid);
    }
}

impl RelayKeeper for InMemoryRelayStore {
    fn is_redundant(&self, packet: &PacketId) -> bool {
        self.processed.read().contains(packet)
    }

    fn update_client_valid(&self, client_id: &str) -> bool {
        self.clients.read().get(client_id).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;
    use crate::keepers::FEE_COLLECTOR;

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn test_account_numbers_assigned_in_order() {
        let accounts = InMemoryAccounts::new();
        let a = accounts.create_account(address_from_string("a"));
        let b = accounts.create_account(address_from_string("b"));
        let again = accounts.create_account(address_from_string("a"));
        assert_eq!(a.account_number, 0);
        assert_eq!(b.account_number, 1);
        assert_eq!(again, a);
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn test_increment_sequence_is_compare_and_set() {
        let accounts = InMemoryAccounts::new();
        let alice = address_from_string("alice");
        accounts.create_account(alice);

        assert_eq!(accounts.increment_sequence(&alice, 0).unwrap(), 1);
        assert!(matches!(
            accounts.increment_sequence(&alice, 0),
            Err(AdmissionError::WrongSequence { expected: 1, got: 0 })
        ));
        assert_eq!(accounts.account(&alice).unwrap().sequence, 1);
        assert!(matches!(
            accounts.increment_sequence(&address_from_string("nobody"), 0),
            Err(AdmissionError::UnknownAddress(_))
        ));
    }

    #[test]
    fn test_failed_transfer_leaves_balances() {
        let bank = InMemoryBank::new();
        let alice = address_from_string("alice");
        bank.set_balance(alice, coins("10uatone"));
        assert!(bank
            .send_coins_to_module(&alice, FEE_COLLECTOR, &coins("11uatone"))
            .is_err());
        assert_eq!(bank.spendable_coins(&alice), coins("10uatone"));
        assert!(bank.module_balance(FEE_COLLECTOR).is_zero());

        bank.send_coins_to_module(&alice, FEE_COLLECTOR, &coins("4uatone"))
            .unwrap();
        assert_eq!(bank.module_balance(FEE_COLLECTOR), coins("4uatone"));
    }

    #[test]
    fn test_feegrant_check_does_not_consume() {
        let grants = InMemoryFeegrant::new();
        let (g, e) = (address_from_string("g"), address_from_string("e"));
        grants.grant(g, e, coins("10uatone"));
        grants
            .check_granted_fees(&g, &e, &coins("10uatone"), &[])
            .unwrap();
        assert_eq!(grants.allowance(&g, &e), Some(coins("10uatone")));
        grants.use_granted_fees(&g, &e, &coins("6uatone"), &[]).unwrap();
        assert!(grants.use_granted_fees(&g, &e, &coins("6uatone"), &[]).is_err());
        assert!(grants.check_granted_fees(&e, &g, &coins("1uatone"), &[]).is_err());
    }
}

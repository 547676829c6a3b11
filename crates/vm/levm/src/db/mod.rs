use rustc_hash::{FxHashMap, FxHashSet};
use txtrace_common::{Address, H256, U256, types::Account};

/// Read-only source of the world state a transaction starts from.
pub trait Database {
    /// Full account, including code and storage. Unknown accounts are empty.
    fn get_account(&self, address: Address) -> Account;
}

/// A [`Database`] backed by a plain map of accounts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    accounts: FxHashMap<Address, Account>,
}

impl InMemoryDatabase {
    pub fn new(accounts: FxHashMap<Address, Account>) -> Self {
        Self { accounts }
    }
}

impl Database for InMemoryDatabase {
    fn get_account(&self, address: Address) -> Account {
        self.accounts.get(&address).cloned().unwrap_or_default()
    }
}

/// Working state of a transaction layered over a [`Database`].
///
/// Accounts are loaded lazily. The first load records the account in
/// `initial_accounts_state`, which is never modified afterwards, so the pre-image of anything the
/// transaction read or wrote stays available for diffing.
pub struct WorldState {
    pub store: Box<dyn Database>,
    pub initial_accounts_state: FxHashMap<Address, Account>,
    pub current_accounts_state: FxHashMap<Address, Account>,
    /// Accounts modified (or explicitly touched) during the transaction.
    touched_accounts: FxHashSet<Address>,
}

impl WorldState {
    pub fn new(store: impl Database + 'static) -> Self {
        Self {
            store: Box::new(store),
            initial_accounts_state: FxHashMap::default(),
            current_accounts_state: FxHashMap::default(),
            touched_accounts: FxHashSet::default(),
        }
    }

    fn load_account(&mut self, address: Address) -> &mut Account {
        let store = &self.store;
        let initial = &mut self.initial_accounts_state;
        self.current_accounts_state
            .entry(address)
            .or_insert_with(|| {
                initial
                    .entry(address)
                    .or_insert_with(|| store.get_account(address))
                    .clone()
            })
    }

    /// Reads an account without marking it as touched.
    pub fn get_account(&mut self, address: Address) -> &Account {
        self.load_account(address)
    }

    /// Mutable access to an account. Callers are responsible for marking it touched and for
    /// recording a backup before writing.
    pub fn get_account_mut(&mut self, address: Address) -> &mut Account {
        self.load_account(address)
    }

    pub fn get_storage_value(&mut self, address: Address, key: H256) -> U256 {
        self.load_account(address)
            .storage
            .get(&key)
            .copied()
            .unwrap_or_default()
    }

    /// Value of a slot at the start of the transaction.
    pub fn get_original_storage(&mut self, address: Address, key: H256) -> U256 {
        self.load_account(address);
        self.initial_accounts_state
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .copied()
            .unwrap_or_default()
    }

    /// Replaces an account wholesale, e.g. when a self-destructed contract is removed.
    pub fn set_account(&mut self, address: Address, account: Account) {
        *self.load_account(address) = account;
    }

    /// Marks the account as touched, returning whether it wasn't already.
    pub fn touch(&mut self, address: Address) -> bool {
        self.load_account(address);
        self.touched_accounts.insert(address)
    }

    pub fn untouch(&mut self, address: &Address) {
        self.touched_accounts.remove(address);
    }

    pub fn is_touched(&self, address: &Address) -> bool {
        self.touched_accounts.contains(address)
    }

    pub fn touched_accounts(&self) -> impl Iterator<Item = &Address> {
        self.touched_accounts.iter()
    }

    /// Account as it was before the transaction. `None` if it was never loaded.
    pub fn initial_account(&self, address: &Address) -> Option<&Account> {
        self.initial_accounts_state.get(address)
    }

    pub fn current_account(&self, address: &Address) -> Option<&Account> {
        self.current_accounts_state.get(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txtrace_common::types::Code;

    fn state_with_account(address: Address, balance: u64) -> WorldState {
        let mut accounts = FxHashMap::default();
        accounts.insert(
            address,
            Account::new(U256::from(balance), Code::default(), 0, FxHashMap::default()),
        );
        WorldState::new(InMemoryDatabase::new(accounts))
    }

    #[test]
    fn reads_do_not_touch() {
        let address = Address::from_low_u64_be(1);
        let mut state = state_with_account(address, 10);
        assert_eq!(state.get_account(address).info.balance, U256::from(10));
        assert!(!state.is_touched(&address));
        assert!(state.touch(address));
        assert!(!state.touch(address));
    }

    #[test]
    fn initial_state_is_preserved() {
        let address = Address::from_low_u64_be(1);
        let mut state = state_with_account(address, 10);
        state.get_account_mut(address).info.balance = U256::from(3);
        state
            .get_account_mut(address)
            .storage
            .insert(H256::zero(), U256::one());

        assert_eq!(
            state.initial_account(&address).unwrap().info.balance,
            U256::from(10)
        );
        assert_eq!(state.get_original_storage(address, H256::zero()), U256::zero());
        assert_eq!(state.get_storage_value(address, H256::zero()), U256::one());
    }

    #[test]
    fn unknown_accounts_are_empty() {
        let mut state = state_with_account(Address::zero(), 0);
        assert!(state.get_account(Address::repeat_byte(0xaa)).is_empty());
    }
}

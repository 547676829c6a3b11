use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use txtrace_common::{Address, H256, U256, serde_utils, types::Account};
use txtrace_levm::db::WorldState;

/// A value before and after the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change<T> {
    pub from: T,
    pub to: T,
}

impl<T: PartialEq> Change<T> {
    pub fn is_unchanged(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HexBytes(#[serde(with = "serde_utils::bytes")] pub Bytes);

/// Before/after record of one account. Storage lists only the slots whose value changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDiff {
    pub balance: Change<U256>,
    pub nonce: Change<u64>,
    pub code: Change<HexBytes>,
    pub storage: BTreeMap<H256, Change<U256>>,
}

impl AccountDiff {
    fn between(before: &Account, after: &Account) -> Self {
        let mut storage = BTreeMap::new();
        for key in before.storage.keys().chain(after.storage.keys()) {
            let change = Change {
                from: before.storage.get(key).copied().unwrap_or_default(),
                to: after.storage.get(key).copied().unwrap_or_default(),
            };
            if !change.is_unchanged() {
                storage.insert(*key, change);
            }
        }

        Self {
            balance: Change {
                from: before.info.balance,
                to: after.info.balance,
            },
            nonce: Change {
                from: before.info.nonce,
                to: after.info.nonce,
            },
            code: Change {
                from: HexBytes(before.code.bytecode.clone()),
                to: HexBytes(after.code.bytecode.clone()),
            },
            storage,
        }
    }
}

/// Changes of every account the transaction touched, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateDiff(pub BTreeMap<Address, AccountDiff>);

impl StateDiff {
    /// Compares the touched accounts of `db` with their state when first loaded.
    ///
    /// Accounts that were only read never show up, even if they are part of the prestate.
    pub fn compute(db: &WorldState) -> Self {
        let empty = Account::default();
        let diff = db
            .touched_accounts()
            .map(|address| {
                let before = db.initial_account(address).unwrap_or(&empty);
                let after = db.current_account(address).unwrap_or(&empty);
                (*address, AccountDiff::between(before, after))
            })
            .collect();
        Self(diff)
    }

    pub fn get(&self, address: &Address) -> Option<&AccountDiff> {
        self.0.get(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.0.keys()
    }
}

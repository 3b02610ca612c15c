//! Implements a process-local store used when the document store is unavailable.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::{
    Error,
    database_id::TransactionId,
    stores::{TransactionStore, UserStore},
    transaction::{NewTransaction, Transaction, TransactionPatch},
    user::{NewUser, User, UserId},
};

/// Stores transactions and users in memory for the lifetime of the process.
///
/// IDs are assigned from counters starting at 1 and are never reused, even
/// after deletes. Nothing written here is ever copied to the document store.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    transactions: BTreeMap<TransactionId, Transaction>,
    next_transaction_id: TransactionId,
    users: BTreeMap<UserId, User>,
    next_user_id: i64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                transactions: BTreeMap::new(),
                next_transaction_id: 1,
                users: BTreeMap::new(),
                next_user_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, Error> {
        self.state.lock().map_err(|error| {
            tracing::error!("Could not acquire the in-memory store lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for MemoryStore {
    /// All transactions, most recent first. Transactions on the same date are
    /// ordered by ID.
    fn list_transactions(&self) -> Result<Vec<Transaction>, Error> {
        let state = self.lock()?;

        let mut transactions: Vec<Transaction> = state.transactions.values().cloned().collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(transactions)
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        Ok(self.lock()?.transactions.get(&id).cloned())
    }

    fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, Error> {
        let mut state = self.lock()?;

        let id = state.next_transaction_id;
        state.next_transaction_id += 1;

        let transaction = transaction.into_transaction(id);
        state.transactions.insert(id, transaction.clone());

        Ok(transaction)
    }

    fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, Error> {
        let mut state = self.lock()?;

        let Some(transaction) = state.transactions.get_mut(&id) else {
            return Ok(None);
        };

        patch.apply(transaction);

        Ok(Some(transaction.clone()))
    }

    fn delete_transaction(&self, id: TransactionId) -> Result<bool, Error> {
        Ok(self.lock()?.transactions.remove(&id).is_some())
    }
}

impl UserStore for MemoryStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>, Error> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    fn create_user(&self, user: NewUser) -> Result<User, Error> {
        let mut state = self.lock()?;

        if state
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(Error::DuplicateUsername(user.username));
        }

        let id = UserId::new(state.next_user_id);
        state.next_user_id += 1;

        let user = user.into_user(id);
        state.users.insert(id, user.clone());

        Ok(user)
    }
}

#[cfg(test)]
mod memory_store_tests {
    use time::macros::datetime;

    use crate::{
        Error,
        stores::{MemoryStore, TransactionStore, UserStore},
        transaction::{Category, NewTransaction, TransactionPatch},
        user::{NewUser, UserId},
    };

    fn new_transaction(description: &str, date: time::OffsetDateTime) -> NewTransaction {
        NewTransaction {
            description: description.to_owned(),
            amount: 4.5,
            date,
            category: Category::FoodAndDining,
            notes: None,
        }
    }

    #[test]
    fn create_assigns_increasing_ids_from_one() {
        let store = MemoryStore::new();

        let first = store
            .create_transaction(new_transaction("a", datetime!(2024-01-01 0:00 UTC)))
            .unwrap();
        let second = store
            .create_transaction(new_transaction("b", datetime!(2024-01-02 0:00 UTC)))
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store
            .create_transaction(new_transaction("a", datetime!(2024-01-01 0:00 UTC)))
            .unwrap();
        store.delete_transaction(first.id).unwrap();

        let second = store
            .create_transaction(new_transaction("b", datetime!(2024-01-02 0:00 UTC)))
            .unwrap();

        assert_eq!(second.id, 2);
    }

    #[test]
    fn create_then_get_returns_input() {
        let store = MemoryStore::new();
        let want = new_transaction("Salary", datetime!(2024-02-01 9:00 UTC));
        let want = NewTransaction {
            category: Category::Income,
            notes: Some("February".to_owned()),
            ..want
        };

        let created = store.create_transaction(want.clone()).unwrap();
        let got = store.get_transaction(created.id).unwrap().unwrap();

        assert_eq!(got, want.into_transaction(created.id));
        assert!(got.is_income);
    }

    #[test]
    fn list_is_sorted_by_date_descending() {
        let store = MemoryStore::new();
        store
            .create_transaction(new_transaction("old", datetime!(2024-01-01 0:00 UTC)))
            .unwrap();
        store
            .create_transaction(new_transaction("new", datetime!(2024-03-01 0:00 UTC)))
            .unwrap();
        store
            .create_transaction(new_transaction("middle", datetime!(2024-02-01 0:00 UTC)))
            .unwrap();

        let descriptions: Vec<_> = store
            .list_transactions()
            .unwrap()
            .into_iter()
            .map(|transaction| transaction.description)
            .collect();

        assert_eq!(descriptions, vec!["new", "middle", "old"]);
    }

    #[test]
    fn update_merges_fields() {
        let store = MemoryStore::new();
        let created = store
            .create_transaction(new_transaction("Coffee", datetime!(2024-01-05 0:00 UTC)))
            .unwrap();

        let updated = store
            .update_transaction(
                created.id,
                TransactionPatch {
                    amount: Some(5.0),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.amount, 5.0);
        assert_eq!(updated.description, "Coffee");
        assert_eq!(updated.date, created.date);
        assert_eq!(store.get_transaction(created.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_date_changes_list_order() {
        let store = MemoryStore::new();
        let first = store
            .create_transaction(new_transaction("Coffee", datetime!(2024-01-05 0:00 UTC)))
            .unwrap();
        store
            .create_transaction(new_transaction("Rent", datetime!(2024-02-01 0:00 UTC)))
            .unwrap();
        let new_date = datetime!(2024-03-10 8:15:30.250 UTC);

        let updated = store
            .update_transaction(
                first.id,
                TransactionPatch {
                    date: Some(new_date),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.date, new_date);
        let descriptions: Vec<_> = store
            .list_transactions()
            .unwrap()
            .into_iter()
            .map(|transaction| transaction.description)
            .collect();
        assert_eq!(descriptions, vec!["Coffee", "Rent"]);
    }

    #[test]
    fn null_notes_patch_clears_notes() {
        let store = MemoryStore::new();
        let created = store
            .create_transaction(NewTransaction {
                notes: Some("hello".to_owned()),
                ..new_transaction("Coffee", datetime!(2024-01-05 0:00 UTC))
            })
            .unwrap();

        let updated = store
            .update_transaction(
                created.id,
                TransactionPatch {
                    notes: Some(None),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.notes, None);
        assert_eq!(
            store.get_transaction(created.id).unwrap().unwrap().notes,
            None
        );
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = MemoryStore::new();

        assert_eq!(store.get_transaction(42).unwrap(), None);
        assert_eq!(
            store
                .update_transaction(42, TransactionPatch::default())
                .unwrap(),
            None
        );
        assert!(!store.delete_transaction(42).unwrap());
    }

    #[test]
    fn delete_twice_returns_true_then_false() {
        let store = MemoryStore::new();
        let created = store
            .create_transaction(new_transaction("a", datetime!(2024-01-01 0:00 UTC)))
            .unwrap();

        assert!(store.delete_transaction(created.id).unwrap());
        assert!(!store.delete_transaction(created.id).unwrap());
    }

    #[test]
    fn users_can_be_found_by_id_and_username() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "alice".to_owned(),
                password: "hunter2".to_owned(),
            })
            .unwrap();

        assert_eq!(user.id, UserId::new(1));
        assert_eq!(store.get_user(user.id).unwrap(), Some(user.clone()));
        assert_eq!(store.get_user_by_username("alice").unwrap(), Some(user));
        assert_eq!(store.get_user_by_username("bob").unwrap(), None);
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            username: "alice".to_owned(),
            password: "hunter2".to_owned(),
        };
        store.create_user(new_user.clone()).unwrap();

        let result = store.create_user(new_user);

        assert_eq!(result, Err(Error::DuplicateUsername("alice".to_owned())));
    }
}

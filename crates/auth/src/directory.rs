//! Credential directory: the panel's account list as an immutable snapshot.
//!
//! A [`Snapshot`] is built from one complete fetch and never mutated. The
//! [`Directory`] holds the current snapshot behind a single lock and swaps it
//! by reference, so readers see either the old set or the new one, never a mix.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use warden_panel::PanelUser;

use crate::hash::CredentialHasher;

/// Both lookup maps derived from one panel fetch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// credential -> account id
    accounts: HashMap<String, u32>,
    /// digest(credential) -> (credential, account id)
    digests: HashMap<String, (String, u32)>,
}

impl Snapshot {
    /// Build both maps from a fetched user list.
    ///
    /// A credential listed twice keeps the id of its last occurrence.
    pub fn build(users: Vec<PanelUser>, hasher: &dyn CredentialHasher) -> Self {
        let mut accounts = HashMap::with_capacity(users.len());
        let mut digests = HashMap::with_capacity(users.len());
        for user in users {
            digests.insert(hasher.digest(&user.uuid), (user.uuid.clone(), user.id));
            accounts.insert(user.uuid, user.id);
        }
        Self { accounts, digests }
    }

    #[must_use]
    pub fn account_id(&self, credential: &str) -> Option<u32> {
        self.accounts.get(credential).copied()
    }

    /// Recover the credential a digest was computed from.
    #[must_use]
    pub fn credential_for_digest(&self, digest: &str) -> Option<&str> {
        self.account_for_digest(digest).map(|(credential, _)| credential)
    }

    /// Resolve a digest to the account it belongs to.
    ///
    /// Known and unknown digests both cost a single map lookup.
    #[must_use]
    pub fn account_for_digest(&self, digest: &str) -> Option<(&str, u32)> {
        self.digests
            .get(digest)
            .map(|(credential, id)| (credential.as_str(), *id))
    }

    #[must_use]
    pub fn contains(&self, credential: &str) -> bool {
        self.accounts.contains_key(credential)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// The currently installed [`Snapshot`].
pub struct Directory {
    current: RwLock<Arc<Snapshot>>,
}

impl Directory {
    /// An empty directory: nothing authenticates until the first install.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// The snapshot in effect right now.
    ///
    /// The lock is held only long enough to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current)
    }

    /// Install `next` as a whole, returning the snapshot it replaced.
    pub fn replace(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, next)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

//! Usage ledger: per-credential traffic not yet reported to the panel.

use std::{collections::HashMap, sync::Mutex};

use warden_panel::Traffic;

use crate::directory::Snapshot;

/// Accumulated, unreported usage keyed by credential.
///
/// A credential has an entry only while it has pending usage. Flushes take
/// the whole map out with [`Ledger::detach`] and, if the push fails, add it
/// back with [`Ledger::restore`].
#[derive(Default)]
pub struct Ledger {
    pending: Mutex<HashMap<String, Traffic>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage for `credential`.
    ///
    /// Zero samples are not stored so they never create an entry.
    pub fn add(&self, credential: &str, traffic: Traffic) {
        if traffic.is_zero() {
            return;
        }
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.get_mut(credential) {
            Some(entry) => entry.add(traffic),
            None => {
                pending.insert(credential.to_string(), traffic);
            },
        }
    }

    /// Take all pending usage, leaving an empty ledger behind.
    pub fn detach(&self) -> HashMap<String, Traffic> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    /// Merge previously detached usage back in, adding to anything recorded
    /// since the detach.
    pub fn restore(&self, detached: HashMap<String, Traffic>) {
        if detached.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (credential, traffic) in detached {
            pending.entry(credential).or_default().add(traffic);
        }
    }

    /// Pending usage for one credential.
    pub fn get(&self, credential: &str) -> Option<Traffic> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.get(credential).copied()
    }

    /// Whether any credential with pending usage is absent from `snapshot`.
    pub fn has_pending_outside(&self, snapshot: &Snapshot) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.keys().any(|credential| !snapshot.contains(credential))
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

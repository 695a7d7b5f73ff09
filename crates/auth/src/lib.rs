//! Panel-backed credential authentication and usage accounting.
//!
//! This crate provides:
//! - `Authenticator`: the `auth`/`record` facade used by connection handlers
//! - `Directory`: the current credential → account snapshot, replaced wholesale
//! - `Ledger`: usage not yet reported to the panel
//! - `SyncLoop`: the background refresh + flush task
//! - `CredentialHasher`/`Sha224Hasher`: the digest used for the lookup index

pub mod authenticator;
pub mod directory;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod sync;

pub use {
    authenticator::{AuthStats, Authenticator},
    directory::{Directory, Snapshot},
    error::{Error, Result},
    hash::{CredentialHasher, Sha224Hasher, SharedHasher},
    ledger::Ledger,
    sync::{FlushOutcome, SyncLoop, SyncOptions, Synchronizer},
};

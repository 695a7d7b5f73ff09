//! One-way digest used to index credentials.

use std::{fmt::Write, sync::Arc};

use sha2::{Digest, Sha224};

/// Deterministic one-way function over a credential.
///
/// The directory stores `digest(credential) -> credential` so lookups by the
/// value a client presents never need the raw credential as a key.
pub trait CredentialHasher: Send + Sync {
    fn digest(&self, credential: &str) -> String;
}

pub type SharedHasher = Arc<dyn CredentialHasher>;

/// Lower-case hex SHA-224, the trojan password digest (56 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha224Hasher;

impl CredentialHasher for Sha224Hasher {
    fn digest(&self, credential: &str) -> String {
        let hash = Sha224::digest(credential.as_bytes());
        let mut out = String::with_capacity(hash.len() * 2);
        for b in hash {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

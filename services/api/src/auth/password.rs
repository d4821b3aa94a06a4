//! Password hashing seam.
//!
//! Hashing internals are a collaborator, not part of this service's core;
//! the trait keeps them swappable. The default implementation is a salted
//! SHA-256 digest.
use sha2::{Digest, Sha256};

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> String;

    fn matches(&self, raw: &str, hashed: &str) -> bool {
        self.hash(raw) == hashed
    }
}

pub struct SaltedSha256 {
    salt: String,
}

impl SaltedSha256 {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl PasswordHasher for SaltedSha256 {
    fn hash(&self, raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(b"|");
        hasher.update(raw.as_bytes());
        hex::encode(hasher.finalize())
    }
}

//! Password hashing for user records.

use snafu::ResultExt;

use crate::error::{self, Result};

/// Prefixes of the bcrypt variants the appliance accepts in a user's `bcrypt-hash` field.
pub const HASH_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

pub trait PasswordHasher {
    /// Hashes a plain-text secret.
    fn hash(&self, secret: &str) -> Result<String>;

    /// Whether the string looks like a hash we can store as-is.
    fn looks_hashed(&self, candidate: &str) -> bool {
        HASH_PREFIXES.iter().any(|p| candidate.starts_with(p))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bcrypt {
    cost: u32,
}

impl Bcrypt {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for Bcrypt {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for Bcrypt {
    fn hash(&self, secret: &str) -> Result<String> {
        bcrypt::hash(secret, self.cost).context(error::HashSnafu)
    }
}

#[cfg(test)]
mod test {
    use super::{Bcrypt, PasswordHasher};

    #[test]
    fn bcrypt_hash_verifies() {
        // Minimum cost, to keep the test fast.
        let hasher = Bcrypt::new(4);
        let hash = hasher.hash("hunter2").unwrap();
        assert!(hasher.looks_hashed(&hash));
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn recognized_prefixes() {
        let hasher = Bcrypt::default();
        for ok in &["$2a$10$abc", "$2b$12$abc", "$2y$04$abc"] {
            assert!(hasher.looks_hashed(ok), "{}", ok);
        }
        for bad in &["notbcrypt", "", "$2$10$abc", "$1$md5", "$6$sha512", " $2b$10$abc"] {
            assert!(!hasher.looks_hashed(bad), "{}", bad);
        }
    }

    #[test]
    fn invalid_cost_is_an_error() {
        assert!(Bcrypt::new(99).hash("x").is_err());
    }
}

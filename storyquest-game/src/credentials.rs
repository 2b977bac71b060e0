//! Password hashing for account login.
//!
//! Passwords are first bound to the username and a server-side pepper with
//! HMAC-SHA256, then the hex of that MAC is hashed with bcrypt. The hex form
//! is always 64 bytes, inside bcrypt's 72-byte input limit, so long
//! passwords are never silently truncated.
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::PASSWORD_HASH_COST;

type HmacSha256 = Hmac<Sha256>;

/// Turns a password into a storable hash and checks it later.
pub trait CredentialCheck {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hash `password` for storage.
    ///
    /// # Errors
    ///
    /// Returns the hasher's error when the hash cannot be produced.
    fn digest(&self, username: &str, password: &str) -> Result<String, Self::Error>;

    /// Whether `password` matches `stored`. Malformed hashes never match.
    fn verify(&self, username: &str, password: &str, stored: &str) -> bool;
}

/// Peppered bcrypt.
#[derive(Debug, Clone)]
pub struct BcryptCredentials {
    pepper: Vec<u8>,
    cost: u32,
}

impl BcryptCredentials {
    /// Hasher at the production work factor.
    #[must_use]
    pub fn new(pepper: impl Into<Vec<u8>>) -> Self {
        Self::with_cost(pepper, PASSWORD_HASH_COST)
    }

    /// Hasher at a chosen bcrypt cost (4 to 31). Simulations and tests use
    /// the minimum.
    #[must_use]
    pub fn with_cost(pepper: impl Into<Vec<u8>>, cost: u32) -> Self {
        Self {
            pepper: pepper.into(),
            cost,
        }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    fn peppered(&self, username: &str, password: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.pepper).ok()?;
        mac.update(username.as_bytes());
        mac.update(&[0]);
        mac.update(password.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

impl CredentialCheck for BcryptCredentials {
    type Error = bcrypt::BcryptError;

    fn digest(&self, username: &str, password: &str) -> Result<String, Self::Error> {
        let peppered = self
            .peppered(username, password)
            .ok_or(bcrypt::BcryptError::InvalidHash(String::from("pepper")))?;
        bcrypt::hash(peppered, self.cost)
    }

    fn verify(&self, username: &str, password: &str, stored: &str) -> bool {
        let Some(peppered) = self.peppered(username, password) else {
            return false;
        };
        bcrypt::verify(peppered, stored).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> BcryptCredentials {
        BcryptCredentials::with_cost("pepper", 4)
    }

    #[test]
    fn hash_verifies_only_matching_password() {
        let creds = creds();
        let stored = creds.digest("ana", "hunter2").unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(creds.verify("ana", "hunter2", &stored));
        assert!(!creds.verify("ana", "hunter3", &stored));
    }

    #[test]
    fn username_and_pepper_bind_the_hash() {
        let creds = creds();
        let stored = creds.digest("ana", "pw").unwrap();
        assert!(!creds.verify("ben", "pw", &stored));
        let other = BcryptCredentials::with_cost("other", 4);
        assert!(!other.verify("ana", "pw", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        let creds = creds();
        let first = creds.digest("ana", "pw").unwrap();
        let second = creds.digest("ana", "pw").unwrap();
        assert_ne!(first, second);
        assert!(creds.verify("ana", "pw", &second));
    }

    #[test]
    fn long_passwords_are_not_truncated() {
        let creds = creds();
        let long = "a".repeat(100);
        let stored = creds.digest("ana", &long).unwrap();
        let mut almost = "a".repeat(99);
        almost.push('b');
        assert!(creds.verify("ana", &long, &stored));
        assert!(!creds.verify("ana", &almost, &stored));
    }

    #[test]
    fn production_cost_and_bad_costs() {
        assert_eq!(BcryptCredentials::new("p").cost(), PASSWORD_HASH_COST);
        assert!(BcryptCredentials::with_cost("p", 2).digest("ana", "pw").is_err());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        let creds = creds();
        assert!(!creds.verify("ana", "pw", "not-a-hash"));
        assert!(!creds.verify("ana", "pw", ""));
    }
}

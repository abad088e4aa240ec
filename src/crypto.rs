//! Cryptogragic logics.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;

type Result<T> = std::result::Result<T, CryptoError>;

const DUMMY_PASSWORD: &str = "accounts-dummy-password";

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
    /// Hash checked when no stored hash exists, so misses cost a verification.
    dummy_hash: String,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        let mut manager = Self {
            params,
            dummy_hash: String::new(),
        };
        manager.dummy_hash = manager.hash_password(DUMMY_PASSWORD)?;

        Ok(manager)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id with a random salt.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC.
    ///
    /// A stored hash that cannot be parsed never verifies.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> bool {
        let Ok(parsed) = PasswordHash::new(phc_hash) else {
            tracing::warn!("stored password hash is not a valid PHC string");
            return false;
        };

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .is_ok()
    }

    /// Run a verification against a throwaway hash. Always `false`.
    ///
    /// Lookups that miss call it so they take as long as a wrong password.
    pub fn verify_missing(&self, password: impl AsRef<[u8]>) -> bool {
        let _ = self.verify_password(password, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> ArgonConfig {
    ArgonConfig {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }
}

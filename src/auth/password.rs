use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

// ============================================================================
// Password Hashing - Argon2id
// ============================================================================

pub struct Passwords {
    argon2: Argon2<'static>,
    dummy_hash: OnceLock<String>,
}

impl Default for Passwords {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl Passwords {
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: OnceLock::new(),
        }
    }

    /// Cheap parameters so test suites do not spend seconds per hash
    #[cfg(test)]
    pub fn fast() -> Self {
        match Params::new(Params::MIN_M_COST * 8, 1, 1, None) {
            Ok(params) => Self::with_params(params),
            Err(_) => Self::default(),
        }
    }

    /// Hash into a PHC string that embeds algorithm, parameters and salt
    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {e}"))
    }

    /// Malformed stored hashes verify as `false`
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Hash compared against when the account does not exist, so unknown
    /// emails cost the same verification work as known ones
    pub fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            self.hash("dummy-password-for-timing").unwrap_or_default()
        })
    }
}

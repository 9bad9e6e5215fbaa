//! Password hashing, verification and strength policy
//!
//! Hashes are Argon2id PHC strings:
//! - Salt: 16 random bytes from the OS generator
//! - Cost parameters fixed when the hasher is built
//! - Verification reads parameters back from the stored hash

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Passwords rejected outright, compared case-insensitively
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "123456789",
    "qwerty",
    "abc123",
    "password123",
    "admin",
    "letmein",
    "welcome",
    "monkey",
    "1234567890",
    "password1",
    "qwerty123",
    "dragon",
    "master",
    "hello",
    "freedom",
    "whatever",
    "qazwsx",
    "trustno1",
];

/// The first strength rule a password failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be at least {min_length} characters long")]
    TooShort { min_length: usize },

    #[error("Password is too common, please choose a stronger password")]
    TooCommon,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Weak password: {0}")]
    Weak(PolicyViolation),

    #[error("Password does not match")]
    Mismatch,

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Strength rules applied before hashing
///
/// Rules are checked in a fixed order (length, denylist, uppercase,
/// lowercase, digit, special) and the first failure is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum length in characters (default: 8)
    pub min_length: usize,
    /// Reject passwords found in the common-password list
    pub reject_common: bool,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    /// Require a non-alphanumeric character (default: off)
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            reject_common: true,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password against every enabled rule
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Password is acceptable
    /// * `Err(PolicyViolation)` - The first rule the password breaks
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.chars().count() < self.min_length {
            return Err(PolicyViolation::TooShort {
                min_length: self.min_length,
            });
        }

        if self.reject_common && is_common_password(password) {
            return Err(PolicyViolation::TooCommon);
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(PolicyViolation::MissingUppercase);
        }

        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(PolicyViolation::MissingLowercase);
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::MissingDigit);
        }

        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(PolicyViolation::MissingSpecial);
        }

        Ok(())
    }
}

fn is_common_password(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|common| *common == lowered)
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Iterations (default: 3)
    pub time_cost: u32,
    /// Lanes (default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Minimal-cost parameters for tests and constrained environments
    pub fn light() -> Self {
        Self {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Policy-checked Argon2id hasher
#[derive(Clone)]
pub struct CredentialHasher {
    policy: PasswordPolicy,
    argon2: Argon2<'static>,
    /// Hash of a random secret, verified against when there is no real hash
    decoy_hash: Arc<str>,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// Build a hasher with the given policy and cost parameters
    ///
    /// Fails only if the cost parameters are out of range for Argon2.
    pub fn new(policy: PasswordPolicy, config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = config.to_params()?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let secret = SaltString::generate(&mut OsRng);
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2
            .hash_password(secret.as_str().as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .to_string();

        Ok(Self {
            policy,
            argon2,
            decoy_hash: Arc::from(decoy_hash),
        })
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Validate a password against the policy and hash it
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - PHC string, safe to persist
    /// * `Err(PasswordError::Weak)` - The password broke a policy rule
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        self.policy.validate(password).map_err(PasswordError::Weak)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a candidate password against a stored hash
    ///
    /// The comparison is done by Argon2 in constant time. A wrong password
    /// yields `PasswordError::Mismatch` and nothing more specific.
    pub fn verify(&self, hash: &str, candidate: &str) -> Result<(), PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        match self.argon2.verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(()),
            Err(argon2::password_hash::Error::Password) => Err(PasswordError::Mismatch),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }

    /// `hash` on the blocking pool, keeping Argon2 off the async workers
    pub async fn hash_blocking(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    /// `verify` on the blocking pool
    pub async fn verify_blocking(
        &self,
        hash: String,
        candidate: String,
    ) -> Result<(), PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &candidate))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
    }

    /// Run a full verification that can never succeed
    ///
    /// Used when there is no stored hash to check (unknown login email) so
    /// the request costs as much as a real password check.
    pub async fn verify_decoy_blocking(&self, candidate: String) -> Result<(), PasswordError> {
        self.verify_blocking(self.decoy_hash.to_string(), candidate)
            .await
    }
}

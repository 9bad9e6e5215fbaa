//! Authentication and account lifecycle
//!
//! - `password`: Argon2id hashing with a strength policy
//! - `jwt`: typed access/refresh tokens
//! - `tokens`: single-use verification and reset tokens
//! - `accounts`: account state and the login gate
//! - `service`: use cases composed from the above
//! - `middleware`: bearer authentication and role checks

pub mod accounts;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod tokens;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use jwt::{Claims, JwtError, JwtService, SigningKeys, TokenType};
pub use middleware::{auth_middleware, require_role, AuthenticatedUser};
pub use models::{Account, AccountView, EphemeralTokenKind, TokenPair};
pub use password::{CredentialHasher, PasswordError, PasswordPolicy, PolicyViolation};
pub use service::{AuthError, AuthService};

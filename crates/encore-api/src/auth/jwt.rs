//! JWT token generation and validation
//!
//! Access and refresh tokens share one claim shape and differ by their
//! `token_type` discriminator. Each kind is signed with its own key set, so a
//! refresh token can never pass access validation and vice versa.

use super::models::{Account, TokenPair};
use chrono::{DateTime, Duration, Utc};
use encore_core::{JwtSettings, UserRole};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Discriminator carried in every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims embedded in access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account id as a string
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Not before (Unix seconds)
    pub nbf: u64,
    /// Expiration (Unix seconds)
    pub exp: u64,
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    pub token_type: TokenType,
}

/// JWT generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Wrong token type: expected {expected}, found {found}")]
    WrongType { expected: TokenType, found: TokenType },

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// Configured lifetime does not fit a timestamp
    #[error("Token lifetime out of range: {0}s")]
    LifetimeOutOfRange(u64),
}

/// Signing and verification keys for one token kind
#[derive(Clone)]
pub struct SigningKeys {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    /// HMAC-SHA256 keys from a shared secret
    pub fn hmac(secret: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// RS256 keys from PEM-encoded private and public keys
    pub fn rsa_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, JwtError> {
        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding: EncodingKey::from_rsa_pem(private_pem)
                .map_err(|e| JwtError::InvalidKey(e.to_string()))?,
            decoding: DecodingKey::from_rsa_pem(public_pem)
                .map_err(|e| JwtError::InvalidKey(e.to_string()))?,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Token lifetimes and issuer
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    /// Access token lifetime in seconds (default: 86400 = 24 hours)
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in seconds (default: 604800 = 7 days)
    pub refresh_expiration_secs: u64,
}

impl From<&JwtSettings> for JwtConfig {
    fn from(settings: &JwtSettings) -> Self {
        Self {
            issuer: settings.issuer.clone(),
            access_expiration_secs: settings.access_expiration_secs,
            refresh_expiration_secs: settings.refresh_expiration_secs,
        }
    }
}

/// Mints and validates typed access/refresh tokens
#[derive(Debug, Clone)]
pub struct JwtService {
    config: JwtConfig,
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
}

impl JwtService {
    pub fn new(config: JwtConfig, access_keys: SigningKeys, refresh_keys: SigningKeys) -> Self {
        Self {
            config,
            access_keys,
            refresh_keys,
        }
    }

    /// HS256 service using the two secrets from configuration
    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(
            JwtConfig::from(settings),
            SigningKeys::hmac(settings.access_secret.as_bytes()),
            SigningKeys::hmac(settings.refresh_secret.as_bytes()),
        )
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issue an access token and a refresh token for an account
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - Both tokens plus the access token's expiry
    /// * `Err(JwtError)` - If signing fails
    pub fn issue_pair(&self, account: &Account) -> Result<TokenPair, JwtError> {
        let now = Utc::now();
        let (access_token, expires_at) = self.mint(
            account.id,
            &account.email,
            account.role,
            TokenType::Access,
            now,
        )?;
        let (refresh_token, _) = self.mint(
            account.id,
            &account.email,
            account.role,
            TokenType::Refresh,
            now,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_expiration_secs,
            expires_at,
        })
    }

    /// Validate an access token and return its claims
    pub fn validate_access(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Access)
    }

    /// Validate a refresh token and return its claims
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Refresh)
    }

    /// Mint a fresh access token from a valid refresh token
    ///
    /// The refresh token itself is not rotated.
    pub fn refresh_access(&self, refresh_token: &str) -> Result<(String, DateTime<Utc>), JwtError> {
        let claims = self.validate_refresh(refresh_token)?;
        self.mint(
            claims.user_id,
            &claims.email,
            claims.role,
            TokenType::Access,
            Utc::now(),
        )
    }

    /// Mint an access token for an identity that was already checked
    pub fn issue_access(&self, account: &Account) -> Result<(String, DateTime<Utc>), JwtError> {
        self.mint(
            account.id,
            &account.email,
            account.role,
            TokenType::Access,
            Utc::now(),
        )
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access_keys,
            TokenType::Refresh => &self.refresh_keys,
        }
    }

    fn lifetime_secs(&self, token_type: TokenType) -> u64 {
        match token_type {
            TokenType::Access => self.config.access_expiration_secs,
            TokenType::Refresh => self.config.refresh_expiration_secs,
        }
    }

    fn mint(
        &self,
        user_id: i64,
        email: &str,
        role: UserRole,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        let lifetime = self.lifetime_secs(token_type);
        let expires_at = i64::try_from(lifetime)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(JwtError::LifetimeOutOfRange(lifetime))?;
        let issued_at = now.timestamp().max(0) as u64;

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: expires_at.timestamp().max(0) as u64,
            user_id,
            email: email.to_string(),
            role,
            token_type,
        };

        let keys = self.keys(token_type);
        let token = encode(&Header::new(keys.algorithm), &claims, &keys.encoding)?;

        Ok((token, expires_at))
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let keys = self.keys(expected);

        let mut validation = Validation::new(keys.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;
        validation.validate_nbf = true;

        let claims = match decode::<Claims>(token, &keys.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::Expired,
                    ErrorKind::InvalidSignature => match peek_token_type(token) {
                        Some(found) if found != expected => JwtError::WrongType { expected, found },
                        _ => JwtError::Invalid,
                    },
                    _ => JwtError::Invalid,
                });
            }
        };

        if claims.token_type != expected {
            return Err(JwtError::WrongType {
                expected,
                found: claims.token_type,
            });
        }

        Ok(claims)
    }
}

/// Read the discriminator of a token without trusting it
///
/// Only used to classify a signature failure; the claims are never returned.
fn peek_token_type(token: &str) -> Option<TokenType> {
    #[derive(Deserialize)]
    struct Discriminator {
        token_type: TokenType,
    }

    let header = jsonwebtoken::decode_header(token).ok()?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Discriminator>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.token_type)
}

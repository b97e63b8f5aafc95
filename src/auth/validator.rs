//! Bearer token verification
//!
//! Tokens are HMAC-signed JWTs. The header algorithm is checked against the
//! HMAC family before any signature work, so a token announcing an
//! asymmetric algorithm can never be verified with the shared secret.
//! `exp`, `nbf` and `iat` are enforced when present, with no leeway;
//! a token is already expired in the second named by `exp`. The audience
//! is not checked.

use crate::auth::claims::TokenClaims;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Algorithms a token may be signed with
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Why a token was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("unexpected signing method: {0}")]
    WrongAlgorithm(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::WrongAlgorithm(err.to_string())
            }
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Verifies tokens against the process-wide signing secret
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Parse and verify `token`, returning its claims
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed("empty token".to_string()));
        }

        let header = jsonwebtoken::decode_header(token)?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::WrongAlgorithm(format!("{:?}", header.alg)));
        }

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)?;
        check_time_claims(&data.claims, chrono::Utc::now().timestamp())?;
        Ok(data.claims)
    }
}

/// Checks jsonwebtoken leaves out: `iat` in the future, and `exp == now`
fn check_time_claims(claims: &TokenClaims, now: i64) -> Result<(), TokenError> {
    if matches!(claims.registered.exp, Some(exp) if exp <= now) {
        return Err(TokenError::Expired);
    }
    match claims.registered.iat {
        Some(iat) if iat > now => Err(TokenError::NotYetValid),
        _ => Ok(()),
    }
}

#![forbid(unsafe_code)]

//! Bearer credential verification.
//!
//! A missing credential is anonymous. A present credential either verifies or rejects the
//! request; it is never downgraded to anonymous.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use travel_kernel_contracts::identity::{ExternalIdentityKey, VerifiedClaim};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credential: {reason}")]
pub struct InvalidCredential {
    pub reason: &'static str,
}

impl InvalidCredential {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<VerifiedClaim, InvalidCredential>;
}

/// Verifies an optional header value. `Bearer ` prefixes are accepted and stripped.
pub fn verify_optional(
    verifier: &dyn IdentityVerifier,
    credential: Option<&str>,
) -> Result<VerifiedClaim, InvalidCredential> {
    let Some(raw) = credential else {
        return Ok(VerifiedClaim::anonymous());
    };
    let raw = raw.trim();
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    if token.is_empty() {
        return Err(InvalidCredential::new("empty credential"));
    }
    verifier.verify(token)
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
}

/// HS256-signed token verifier. `sub` carries the external identity key; `exp` is required.
pub struct HsTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl HsTokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 30;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }
}

impl std::fmt::Debug for HsTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HsTokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("iss", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl IdentityVerifier for HsTokenVerifier {
    fn verify(&self, credential: &str) -> Result<VerifiedClaim, InvalidCredential> {
        let data = jsonwebtoken::decode::<TokenClaims>(credential, &self.key, &self.validation)
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidIssuer => "wrong issuer",
                    ErrorKind::InvalidAlgorithm => "unsupported algorithm",
                    ErrorKind::MissingRequiredClaim(_) => "missing claim",
                    _ => "malformed",
                };
                tracing::debug!(reason, "credential rejected");
                InvalidCredential::new(reason)
            })?;
        let key = ExternalIdentityKey::new(data.claims.sub)
            .map_err(|_| InvalidCredential::new("missing subject"))?;
        Ok(VerifiedClaim::verified(key))
    }
}

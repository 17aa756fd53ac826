#![forbid(unsafe_code)]

use travel_kernel_contracts::identity::VerifiedClaim;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Permit,
    Deny,
}

/// Guards identity-resolution lookups: the caller may only resolve their own identity key.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Exact, case-sensitive comparison. Anonymous claims are always denied.
    pub fn authorize(claim: &VerifiedClaim, target_identity_key: &str) -> GateDecision {
        match claim.identity_key() {
            Some(key) if key.as_str() == target_identity_key => GateDecision::Permit,
            _ => GateDecision::Deny,
        }
    }
}

//! Caller classification.
//!
//! The trusted secret is read from the env var named by
//! `config.server.admin_token_env` **once at startup** and only the SHA-256
//! digest of the full header value `Bearer <secret>` is kept. A presented
//! `Authorization` value is hashed untouched and compared in constant time,
//! so padding, case changes or a missing scheme never match.
//! - No header: anonymous caller, identified by network origin.
//! - Exactly `Bearer <secret>`: trusted caller, exempt from all usage limits.
//! - Any other value: rejected. Never downgraded to anonymous.

use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    #[serde(rename = "admin")]
    Trusted,
    #[serde(rename = "demo")]
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub tier: Tier,
    /// Network origin (client IP or forwarded address).
    pub origin: String,
}

impl Identity {
    pub fn is_trusted(&self) -> bool {
        self.tier == Tier::Trusted
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid API key")]
pub struct AuthenticationError;

pub struct IdentityClassifier {
    /// Digest of the expected `Authorization` value.
    expected_hash: Option<Vec<u8>>,
}

impl IdentityClassifier {
    /// `None` or an empty secret disables the trusted tier.
    pub fn new(secret: Option<&str>) -> Self {
        let expected_hash = secret
            .filter(|s| !s.is_empty())
            .map(|s| Sha256::digest(format!("Bearer {s}").as_bytes()).to_vec());
        Self { expected_hash }
    }

    pub fn from_env(var: &str) -> Self {
        let secret = std::env::var(var).ok();
        let classifier = Self::new(secret.as_deref());
        if classifier.expected_hash.is_none() {
            tracing::warn!(env = var, "trusted-caller secret not set; every caller is anonymous");
        }
        classifier
    }

    pub fn has_secret(&self) -> bool {
        self.expected_hash.is_some()
    }

    /// `authorization` is the raw `Authorization` header value, if any.
    pub fn classify(
        &self,
        authorization: Option<&str>,
        origin: &str,
    ) -> Result<Identity, AuthenticationError> {
        let presented = match authorization.filter(|c| !c.is_empty()) {
            None => {
                return Ok(Identity {
                    tier: Tier::Anonymous,
                    origin: origin.to_string(),
                })
            }
            Some(c) => c,
        };

        let Some(expected) = &self.expected_hash else {
            tracing::debug!(origin, "credential presented but no trusted secret configured");
            return Err(AuthenticationError);
        };

        let provided = Sha256::digest(presented.as_bytes());
        if !bool::from(provided.ct_eq(expected.as_slice())) {
            tracing::debug!(origin, "credential mismatch");
            return Err(AuthenticationError);
        }

        Ok(Identity {
            tier: Tier::Trusted,
            origin: origin.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credential_is_anonymous() {
        let classifier = IdentityClassifier::new(Some("s3cret"));
        let id = classifier.classify(None, "1.2.3.4").unwrap();
        assert_eq!(id.tier, Tier::Anonymous);
        assert_eq!(id.origin, "1.2.3.4");

        let id = classifier.classify(Some(""), "1.2.3.4").unwrap();
        assert!(!id.is_trusted());
    }

    #[test]
    fn matching_credential_is_trusted() {
        let classifier = IdentityClassifier::new(Some("s3cret"));
        assert!(classifier.classify(Some("Bearer s3cret"), "10.0.0.1").unwrap().is_trusted());
    }

    #[test]
    fn wrong_credential_is_rejected() {
        let classifier = IdentityClassifier::new(Some("s3cret"));
        assert!(classifier.classify(Some("Bearer s3cret2"), "10.0.0.1").is_err());
        assert!(classifier.classify(Some("Bearer S3CRET"), "10.0.0.1").is_err());
    }

    #[test]
    fn only_the_exact_bearer_form_matches() {
        let classifier = IdentityClassifier::new(Some("s3cret"));
        for header in [
            "s3cret",
            "Bearer   s3cret   ",
            "Bearer s3cret ",
            " Bearer s3cret",
            "bearer s3cret",
            "Bearer\ts3cret",
            "Token s3cret",
        ] {
            assert!(
                classifier.classify(Some(header), "10.0.0.1").is_err(),
                "{header:?} should not be trusted"
            );
        }
    }

    #[test]
    fn any_credential_rejected_without_secret() {
        let classifier = IdentityClassifier::new(None);
        assert!(!classifier.has_secret());
        assert!(classifier.classify(Some("Bearer anything"), "10.0.0.1").is_err());
        assert!(IdentityClassifier::new(Some("")).classify(Some("x"), "o").is_err());
    }

    #[test]
    fn tier_wire_names() {
        assert_eq!(serde_json::to_value(Tier::Trusted).unwrap(), "admin");
        assert_eq!(serde_json::to_value(Tier::Anonymous).unwrap(), "demo");
    }
}

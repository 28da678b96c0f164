//! Author identity normalization
//!
//! Collapses the `(name, email)` pairs recorded in commits into one stable
//! identity per person. The key is the lowercased, trimmed email; anything
//! without an `@` maps to a reserved placeholder so normalization is total.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder key for commits with a missing or malformed author email.
pub const DEFAULT_UNKNOWN_EMAIL: &str = "unknown@unknown";

/// Display name used when a commit carries no author name at all.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A canonical author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorIdentity {
    /// Identity key (lowercase email or the unknown placeholder)
    pub email: String,
    /// Display name (first seen wins when identities merge)
    pub name: String,
    /// Local part of the email, before the first `@`
    pub username: String,
    /// Part of the email after the last `@`
    pub domain: String,
}

/// Normalizes raw commit author fields into [`AuthorIdentity`] values.
#[derive(Debug, Clone)]
pub struct IdentityNormalizer {
    unknown_email: String,
}

impl Default for IdentityNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_UNKNOWN_EMAIL)
    }
}

impl IdentityNormalizer {
    pub fn new(unknown_email: &str) -> Self {
        let cleaned = unknown_email.trim().to_lowercase();
        let unknown_email = if cleaned.is_empty() {
            DEFAULT_UNKNOWN_EMAIL.to_string()
        } else {
            cleaned
        };
        Self { unknown_email }
    }

    /// The placeholder key used for unknown authors.
    pub fn unknown_email(&self) -> &str {
        &self.unknown_email
    }

    pub fn is_unknown(&self, identity: &AuthorIdentity) -> bool {
        identity.email == self.unknown_email
    }

    /// Normalize one raw `(name, email)` pair.
    ///
    /// Pure and idempotent: feeding the result's name and email back in
    /// yields the same key.
    pub fn normalize(&self, name: &str, raw_email: &str) -> AuthorIdentity {
        let name = match name.trim() {
            "" => UNKNOWN_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };

        let cleaned = raw_email.trim().to_lowercase();
        let email = if cleaned.is_empty() || !cleaned.contains('@') {
            self.unknown_email.clone()
        } else {
            cleaned
        };

        let (username, domain) = split_email(&email);
        AuthorIdentity {
            username: username.to_string(),
            domain: domain.to_string(),
            email,
            name,
        }
    }
}

/// Username before the first `@`, domain after the last one.
///
/// `a@b@c.com` therefore yields `("a", "c.com")`.
fn split_email(email: &str) -> (&str, &str) {
    match (email.find('@'), email.rfind('@')) {
        (Some(first), Some(last)) => (&email[..first], &email[last + 1..]),
        _ => (email, ""),
    }
}

/// Maps an author's email domain to the organization it is rolled up under.
///
/// Disabled by default: organizations key on the identity domain as-is.
/// With `collapse_subdomains`, `dev.corp.example.com` becomes `example.com`
/// unless the domain is listed in `preserve_full_domain`; `custom_mappings`
/// always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgDomainPolicy {
    pub collapse_subdomains: bool,
    pub preserve_full_domain: Vec<String>,
    pub custom_mappings: BTreeMap<String, String>,
}

impl OrgDomainPolicy {
    pub fn organization_for(&self, domain: &str) -> String {
        let domain = domain.trim().to_lowercase();
        if let Some(mapped) = self.custom_mappings.get(&domain) {
            return mapped.to_lowercase();
        }
        if !self.collapse_subdomains || self.preserve_full_domain.iter().any(|d| *d == domain) {
            return domain;
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() <= 2 {
            domain
        } else {
            labels[labels.len() - 2..].join(".")
        }
    }
}

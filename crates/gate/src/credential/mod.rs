// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session credentials: the in-memory store, the refresh client, and the
//! single-flight refresh coordinator.

pub mod coordinator;
pub mod refresh;
pub mod store;

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Proof of identity presented to protected endpoints.
///
/// The gatekeeper only cares whether one is present; it never looks inside.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Explicit bearer token sent in the `Authorization` header.
    Bearer(String),
    /// Cookie-backed session held by the HTTP transport; presence is implied.
    Ambient,
}

impl Credential {
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::Bearer(token) => Some(token),
            Self::Ambient => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Ambient => f.write_str("Ambient"),
        }
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Login identity (the token's `sub` claim, usually an email).
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    tenant_id: Option<i64>,
}

impl Principal {
    /// Decode the principal from a JWT's payload segment.
    ///
    /// Returns `None` for opaque tokens. The signature is not checked; the
    /// server remains the authority on validity.
    pub fn from_jwt(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        Some(Self { subject: claims.sub, tenant_id: claims.tenant_id })
    }
}

/// Current sign-in state: who is signed in and what proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: Option<Principal>,
    pub credential: Option<Credential>,
}

impl Session {
    /// Build a session from a freshly issued credential.
    ///
    /// The principal comes from the token's claims when it is a JWT, otherwise
    /// from `fallback_subject` (typically the login username).
    pub fn signed_in(credential: Credential, fallback_subject: Option<&str>) -> Self {
        let principal = credential.bearer_token().and_then(Principal::from_jwt).or_else(|| {
            fallback_subject.map(|s| Principal { subject: s.to_owned(), tenant_id: None })
        });
        Self { principal, credential: Some(credential) }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

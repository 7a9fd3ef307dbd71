// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transport::gatekeeper::AuthEndpoints;
use crate::transport::{ApiRequest, ApiResponse};

/// How a failed call is handled by the gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// A login/refresh/logout call was itself denied. Terminal.
    AuthEndpoint,
    /// Any other call was denied; recovered by a single-flight refresh.
    Refreshable,
    /// The refresh attempt failed. Terminal for every waiter of the cycle.
    Refresh,
    /// Not an authentication problem; surfaced unchanged.
    Passthrough,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthEndpoint => "AUTH_ENDPOINT_FAILURE",
            Self::Refreshable => "REFRESHABLE_FAILURE",
            Self::Refresh => "REFRESH_FAILURE",
            Self::Passthrough => "PASSTHROUGH_FAILURE",
        }
    }

    /// Whether this failure tears down the session and redirects to sign-in.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthEndpoint | Self::Refresh)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a response to `request`. Returns `None` on success.
///
/// Only `401 Unauthorized` counts as an authentication denial; `403` means the
/// credential was valid but lacked rights and is passed through.
pub fn classify(
    request: &ApiRequest,
    response: &ApiResponse,
    endpoints: &AuthEndpoints,
) -> Option<FailureKind> {
    if response.is_success() {
        return None;
    }
    if !response.is_auth_denied() {
        return Some(FailureKind::Passthrough);
    }
    if endpoints.is_auth_endpoint(&request.path) {
        Some(FailureKind::AuthEndpoint)
    } else {
        Some(FailureKind::Refreshable)
    }
}

/// A non-success API response surfaced by the typed [`crate::client::ApiClient`] helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    /// Build from a response, reading `{"detail": ...}` when the body has one.
    pub fn from_response(response: &ApiResponse) -> Self {
        let detail = serde_json::from_slice::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|v| match v.get("detail") {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
                None => None,
            })
            .unwrap_or_else(|| response.text());
        Self { status: response.status.as_u16(), detail }
    }

    pub fn is_auth_denied(&self) -> bool {
        self.status == 401
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "api error ({})", self.status)
        } else {
            write!(f, "api error ({}): {}", self.status, self.detail)
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

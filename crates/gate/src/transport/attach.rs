// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::config::CredentialMode;
use crate::credential::store::SessionStore;
use crate::credential::Credential;
use crate::transport::{ApiRequest, ApiResponse, BoxFuture, Transport};

/// Pipeline stage that attaches the current credential to each request.
///
/// The session store is read on every call, so a replay after a refresh
/// carries the renewed credential.
pub struct AttachCredential<T> {
    inner: T,
    store: Arc<SessionStore>,
    mode: CredentialMode,
}

impl<T: Transport> AttachCredential<T> {
    pub fn new(inner: T, store: Arc<SessionStore>, mode: CredentialMode) -> Self {
        Self { inner, store, mode }
    }

    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    fn attach(&self, mut request: ApiRequest) -> ApiRequest {
        match self.mode {
            CredentialMode::Bearer => {
                if let Some(Credential::Bearer(token)) = self.store.credential() {
                    match HeaderValue::from_str(&format!("Bearer {token}")) {
                        Ok(mut value) => {
                            value.set_sensitive(true);
                            request.headers.insert(AUTHORIZATION, value);
                        }
                        Err(e) => {
                            tracing::warn!(err = %e, "credential is not a valid header value");
                        }
                    }
                }
            }
            // The cookie rides along whether or not the store knows about it.
            CredentialMode::Cookie => request.with_credentials = true,
        }
        request
    }
}

impl<T: Transport> Transport for AttachCredential<T> {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>> {
        let request = self.attach(request);
        self.inner.send(request)
    }
}

#[cfg(test)]
#[path = "attach_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh and logout network calls.

use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::config::CredentialMode;
use crate::credential::{Credential, TokenResponse};
use crate::transport::gatekeeper::AuthEndpoints;
use crate::transport::{ApiRequest, BoxFuture, Transport};

/// Performs the refresh and logout calls. No coordination of its own: callers
/// must hold refresh leadership before calling [`RefreshClient::refresh`].
///
/// Object-safe for use as `Arc<dyn RefreshClient>`.
pub trait RefreshClient: Send + Sync {
    /// Issue exactly one refresh call and return the renewed credential.
    fn refresh(&self) -> BoxFuture<'_, anyhow::Result<Credential>>;

    /// Best-effort server-side logout of `credential`, which may already be
    /// gone from the session store.
    fn logout(&self, credential: Credential) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// [`RefreshClient`] over the credential-attaching transport stage.
///
/// Sends below the gatekeeper, so a denied refresh is reported here rather
/// than triggering another refresh.
pub struct HttpRefreshClient<T> {
    transport: T,
    endpoints: AuthEndpoints,
    mode: CredentialMode,
}

impl<T: Transport> HttpRefreshClient<T> {
    pub fn new(transport: T, endpoints: AuthEndpoints, mode: CredentialMode) -> Self {
        Self { transport, endpoints, mode }
    }

    async fn do_refresh(&self) -> anyhow::Result<Credential> {
        let resp = self.transport.send(ApiRequest::post(self.endpoints.refresh.clone())).await?;

        if !resp.is_success() {
            let status = resp.status;
            anyhow::bail!("refresh failed ({status}): {}", resp.text());
        }

        match self.mode {
            CredentialMode::Bearer => {
                let token: TokenResponse = resp.json()?;
                Ok(Credential::Bearer(token.access_token))
            }
            // The renewed session cookie was stored by the HTTP stage.
            CredentialMode::Cookie => Ok(Credential::Ambient),
        }
    }

    async fn do_logout(&self, credential: Credential) -> anyhow::Result<()> {
        let mut request = ApiRequest::post(self.endpoints.logout.clone());
        if let Credential::Bearer(token) = &credential {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            request = request.header(AUTHORIZATION, value);
        }
        let resp = self.transport.send(request).await?;
        if !resp.is_success() {
            let status = resp.status;
            anyhow::bail!("logout failed ({status}): {}", resp.text());
        }
        Ok(())
    }
}

impl<T: Transport> RefreshClient for HttpRefreshClient<T> {
    fn refresh(&self) -> BoxFuture<'_, anyhow::Result<Credential>> {
        Box::pin(self.do_refresh())
    }

    fn logout(&self, credential: Credential) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(self.do_logout(credential))
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;

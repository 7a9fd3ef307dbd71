// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication-failure handling for every outgoing call.
//!
//! Successful and non-401 responses pass through untouched. A 401 on the
//! login, refresh, or logout endpoint is terminal. Any other 401 joins the
//! single-flight refresh: the leader refreshes, every caller of the cycle
//! replays its original request once with the renewed credential, and a
//! failed refresh returns each caller its own original 401. A bearer call
//! denied with no stored credential has nothing to refresh and signs out
//! directly. When a leader is cancelled mid-refresh its followers bid once
//! more, so one of them carries the refresh through.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CredentialMode;
use crate::credential::coordinator::{LeaderGuard, RefreshCoordinator, RefreshOutcome, Role};
use crate::credential::refresh::RefreshClient;
use crate::credential::store::SessionStore;
use crate::error::{classify, FailureKind};
use crate::redirect::{sign_out, Redirector};
use crate::transport::{normalize_path, ApiRequest, ApiResponse, BoxFuture, Transport};

/// Paths of the endpoints that issue, renew, and revoke credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
}

impl AuthEndpoints {
    /// Whether `path` targets one of the credential endpoints.
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        let route = normalize_path(path);
        [&self.login, &self.refresh, &self.logout]
            .into_iter()
            .any(|endpoint| normalize_path(endpoint) == route)
    }

    pub fn is_logout(&self, path: &str) -> bool {
        normalize_path(path) == normalize_path(&self.logout)
    }
}

/// Pipeline stage that recovers from expired credentials.
///
/// `inner` must attach credentials itself (see
/// [`AttachCredential`](crate::transport::attach::AttachCredential)) so that
/// replays pick up the refreshed credential.
pub struct Gatekeeper<T> {
    inner: T,
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    refresher: Arc<dyn RefreshClient>,
    redirector: Arc<dyn Redirector>,
    endpoints: AuthEndpoints,
    mode: CredentialMode,
    follower_timeout: Option<Duration>,
}

impl<T: Transport> Gatekeeper<T> {
    pub fn new(
        inner: T,
        store: Arc<SessionStore>,
        refresher: Arc<dyn RefreshClient>,
        redirector: Arc<dyn Redirector>,
        endpoints: AuthEndpoints,
    ) -> Self {
        Self {
            inner,
            store,
            coordinator: RefreshCoordinator::new(),
            refresher,
            redirector,
            endpoints,
            mode: CredentialMode::Bearer,
            follower_timeout: None,
        }
    }

    /// Share a coordinator with other pipelines in the same process.
    pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_credential_mode(mut self, mode: CredentialMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bound how long a request waits on another caller's refresh.
    pub fn with_follower_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.follower_timeout = timeout;
        self
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        let response = self.inner.send(request.clone()).await?;

        match classify(&request, &response, &self.endpoints) {
            None | Some(FailureKind::Passthrough) => Ok(response),
            Some(FailureKind::AuthEndpoint) => {
                tracing::info!(
                    path = %request.path,
                    kind = %FailureKind::AuthEndpoint,
                    "credential endpoint denied, signing out"
                );
                let revoke = !self.endpoints.is_logout(&request.path);
                sign_out(&self.store, self.refresher.as_ref(), self.redirector.as_ref(), revoke)
                    .await;
                Ok(response)
            }
            Some(_) if !self.can_refresh() => {
                tracing::info!(path = %request.path, "denied without a credential, signing out");
                sign_out(&self.store, self.refresher.as_ref(), self.redirector.as_ref(), false)
                    .await;
                Ok(response)
            }
            Some(_) => self.recover(request, response).await,
        }
    }

    /// A bearer refresh needs a stored credential; a cookie session may be
    /// renewable even when the store is empty.
    fn can_refresh(&self) -> bool {
        match self.mode {
            CredentialMode::Bearer => self.store.credential().is_some(),
            CredentialMode::Cookie => true,
        }
    }

    async fn recover(
        &self,
        request: ApiRequest,
        denied: ApiResponse,
    ) -> anyhow::Result<ApiResponse> {
        let mut rejoined = false;
        loop {
            let follower = match self.coordinator.try_become_leader() {
                Role::Leader(guard) => return self.lead(guard, request, denied).await,
                Role::Follower(follower) => follower,
            };
            let cycle = follower.cycle();
            match follower.wait(self.follower_timeout).await {
                Some(RefreshOutcome::Refreshed) => {
                    tracing::debug!(cycle, path = %request.path, "replaying after refresh");
                    return self.inner.send(request).await;
                }
                Some(RefreshOutcome::Failed(_)) => return Ok(denied),
                Some(RefreshOutcome::Abandoned) if !rejoined => {
                    tracing::debug!(cycle, path = %request.path, "refresh abandoned, bidding again");
                    rejoined = true;
                }
                Some(RefreshOutcome::Abandoned) => return Ok(denied),
                None => {
                    tracing::warn!(cycle, path = %request.path, "timed out waiting on refresh");
                    return Ok(denied);
                }
            }
        }
    }

    async fn lead(
        &self,
        guard: LeaderGuard,
        request: ApiRequest,
        denied: ApiResponse,
    ) -> anyhow::Result<ApiResponse> {
        let cycle = guard.cycle();
        match self.refresher.refresh().await {
            Ok(credential) => {
                self.store.set_credential(credential);
                guard.settle(RefreshOutcome::Refreshed);
                tracing::info!(cycle, path = %request.path, "credential refreshed, replaying");
                self.inner.send(request).await
            }
            Err(e) => {
                tracing::warn!(cycle, kind = %FailureKind::Refresh, err = %e, "credential refresh failed");
                guard.settle(RefreshOutcome::Failed(e.to_string()));
                sign_out(&self.store, self.refresher.as_ref(), self.redirector.as_ref(), true)
                    .await;
                Ok(denied)
            }
        }
    }
}

impl<T: Transport> Transport for Gatekeeper<T> {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>> {
        Box::pin(self.handle(request))
    }
}

#[cfg(test)]
#[path = "gatekeeper_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level API client: the assembled pipeline plus sign-in helpers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_stream::Stream;

use crate::config::{CredentialMode, GateConfig};
use crate::credential::refresh::{HttpRefreshClient, RefreshClient};
use crate::credential::store::SessionStore;
use crate::credential::{Credential, Session, TokenResponse};
use crate::error::ApiError;
use crate::redirect::{sign_out, Redirector};
use crate::transport::attach::AttachCredential;
use crate::transport::gatekeeper::{AuthEndpoints, Gatekeeper};
use crate::transport::http::HttpTransport;
use crate::transport::{ApiRequest, ApiResponse, Transport};

type Pipeline = Gatekeeper<AttachCredential<Arc<HttpTransport>>>;

/// Client for the point-of-sale API.
///
/// Every call goes through the gatekeeper, so an expired credential is
/// refreshed once and the call replayed transparently.
pub struct ApiClient {
    http: Arc<HttpTransport>,
    store: Arc<SessionStore>,
    refresher: Arc<dyn RefreshClient>,
    redirector: Arc<dyn Redirector>,
    pipeline: Pipeline,
    mode: CredentialMode,
}

impl ApiClient {
    pub fn new(config: &GateConfig, redirector: Arc<dyn Redirector>) -> anyhow::Result<Self> {
        config.validate()?;
        let mode = config.credential_mode;
        let endpoints = config.endpoints();
        let http = Arc::new(HttpTransport::new(&config.api_url, config.request_timeout())?);
        let store = Arc::new(SessionStore::new());

        let refresher: Arc<dyn RefreshClient> = Arc::new(HttpRefreshClient::new(
            AttachCredential::new(Arc::clone(&http), Arc::clone(&store), mode),
            endpoints.clone(),
            mode,
        ));
        let pipeline = Gatekeeper::new(
            AttachCredential::new(Arc::clone(&http), Arc::clone(&store), mode),
            Arc::clone(&store),
            Arc::clone(&refresher),
            Arc::clone(&redirector),
            endpoints,
        )
        .with_credential_mode(mode)
        .with_follower_timeout(config.follower_timeout());

        Ok(Self { http, store, refresher, redirector, pipeline, mode })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn session(&self) -> Option<Session> {
        self.store.current()
    }

    pub fn changes(&self) -> impl Stream<Item = Option<Session>> + Send + 'static {
        self.store.changes()
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        self.pipeline.endpoints()
    }

    /// Cookie header the client would send to `path` in cookie mode.
    pub fn cookies_for(&self, path: &str) -> Option<String> {
        self.http.cookies_for(path)
    }

    /// Whether a refresh cycle is in flight right now.
    pub fn is_refreshing(&self) -> bool {
        self.pipeline.coordinator().is_refreshing()
    }

    /// Sign in with a username and password.
    ///
    /// A denied login is terminal: the session is cleared and the user sent
    /// to sign-in before the error is returned.
    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<Session> {
        let request = ApiRequest::post(self.endpoints().login.clone())
            .form(&[("username", username), ("password", password)])?;
        let resp = self.pipeline.send(request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp).into());
        }

        let credential = match self.mode {
            CredentialMode::Bearer => {
                let token: TokenResponse = resp.json()?;
                Credential::Bearer(token.access_token)
            }
            CredentialMode::Cookie => Credential::Ambient,
        };
        let session = Session::signed_in(credential, Some(username));
        self.store.set(session.clone());
        tracing::info!(
            subject = session.principal.as_ref().map(|p| p.subject.as_str()).unwrap_or_default(),
            "signed in"
        );
        Ok(session)
    }

    /// Install a credential obtained elsewhere.
    pub fn seed(&self, token: impl Into<String>) {
        self.store.set(Session::signed_in(Credential::Bearer(token.into()), None));
    }

    /// User-initiated sign-out.
    pub async fn logout(&self) {
        sign_out(&self.store, self.refresher.as_ref(), self.redirector.as_ref(), true).await;
    }

    /// Send a raw request through the pipeline. Non-2xx statuses are returned
    /// as responses.
    pub async fn send(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        self.pipeline.send(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.call(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let resp = self.pipeline.send(ApiRequest::delete(path)).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp).into());
        }
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> anyhow::Result<T> {
        let resp = self.pipeline.send(request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp).into());
        }
        resp.json()
    }
}

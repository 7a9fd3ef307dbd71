// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP leaf stage over `reqwest`.

use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Url};

use crate::transport::{ApiRequest, ApiResponse, BoxFuture, Transport};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Sends requests to the API and keeps the session cookie jar.
///
/// `Set-Cookie` headers from every response are stored; cookies are only
/// sent on requests marked `with_credentials`.
pub struct HttpTransport {
    base_url: String,
    client: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        ensure_crypto();
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { base_url, client, jar: Arc::new(Jar::default()) })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cookie header value the jar would send to `path`, if any.
    pub fn cookies_for(&self, path: &str) -> Option<String> {
        let url = self.url(path).ok()?;
        self.jar.cookies(&url).and_then(|v| v.to_str().ok().map(str::to_owned))
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    async fn dispatch(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        let url = self.url(&request.path)?;
        let mut builder =
            self.client.request(request.method.clone(), url.clone()).headers(request.headers);
        if request.with_credentials {
            if let Some(cookies) = self.jar.cookies(&url) {
                builder = builder.header(COOKIE, cookies);
            }
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let mut set_cookies = headers.get_all(SET_COOKIE).iter();
        self.jar.set_cookies(&mut set_cookies, &url);
        let body = resp.bytes().await?;

        tracing::trace!(method = %request.method, path = %request.path, %status, "api call");
        Ok(ApiResponse { status, headers, body })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>> {
        Box::pin(self.dispatch(request))
    }
}

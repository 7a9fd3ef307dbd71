// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fakes shared by unit tests: a scripted API, a counting refresher, and a
//! JWT builder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;

use crate::credential::refresh::RefreshClient;
use crate::credential::Credential;
use crate::transport::{ApiRequest, ApiResponse, BoxFuture, Transport};

/// Build an unsigned JWT carrying `sub` and optional `tenant_id` claims.
pub fn jwt(sub: &str, tenant_id: Option<i64>) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = match tenant_id {
        Some(t) => serde_json::json!({ "sub": sub, "tenant_id": t }),
        None => serde_json::json!({ "sub": sub }),
    };
    let payload = engine.encode(claims.to_string());
    format!("{header}.{payload}.c2ln")
}

/// Extract the bearer token a request carried, if any.
pub fn bearer_of(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Scripted API: accepts one bearer token (or ambient cookies when enabled),
/// answers 401 otherwise, and records every request it sees.
pub struct FakeApi {
    valid_token: Mutex<String>,
    ambient_valid: Mutex<bool>,
    fixed: Mutex<HashMap<String, (StatusCode, String)>>,
    disconnected: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    pub fn new(valid_token: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(valid_token.to_owned()),
            ambient_valid: Mutex::new(false),
            fixed: Mutex::new(HashMap::new()),
            disconnected: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answer `status` on `route`, regardless of credentials.
    pub fn respond(&self, route: &str, status: StatusCode) {
        let body = serde_json::json!({ "detail": status.canonical_reason() }).to_string();
        self.respond_with(route, status, &body);
    }

    /// Always answer `status` with `body` on `route`.
    pub fn respond_with(&self, route: &str, status: StatusCode, body: &str) {
        self.fixed.lock().insert(route.to_owned(), (status, body.to_owned()));
    }

    /// Answer the first `after` requests on `route`, then fail the rest with a
    /// transport error.
    pub fn disconnect(&self, route: &str, after: usize) {
        self.disconnected.lock().insert(route.to_owned(), after);
    }

    pub fn accept_token(&self, token: &str) {
        *self.valid_token.lock() = token.to_owned();
    }

    pub fn accept_ambient(&self, valid: bool) {
        *self.ambient_valid.lock() = valid;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, route: &str) -> Vec<ApiRequest> {
        self.requests.lock().iter().filter(|r| r.route() == route).cloned().collect()
    }

    fn answer(&self, request: &ApiRequest) -> ApiResponse {
        if let Some((status, body)) = self.fixed.lock().get(request.route()).cloned() {
            return ApiResponse::new(status, body);
        }
        let bearer_ok = bearer_of(request).is_some_and(|t| t == *self.valid_token.lock());
        let ambient_ok = request.with_credentials && *self.ambient_valid.lock();
        if bearer_ok || ambient_ok {
            let body = serde_json::json!({ "route": request.route() }).to_string();
            ApiResponse::new(StatusCode::OK, body)
        } else {
            ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"detail":"Could not validate credentials"}"#)
        }
    }
}

impl Transport for FakeApi {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>> {
        let seen = self.requests_to(request.route()).len();
        let cut = self.disconnected.lock().get(request.route()).is_some_and(|after| seen >= *after);
        let response = self.answer(&request);
        self.requests.lock().push(request);
        Box::pin(async move {
            // Yield so concurrent callers interleave like real I/O.
            tokio::task::yield_now().await;
            if cut {
                anyhow::bail!("connection reset by peer");
            }
            Ok(response)
        })
    }
}

/// Refresher that counts calls and returns a scripted result after `delay`.
/// Logout also takes `delay`.
pub struct FakeRefresher {
    refresh_calls: AtomicU32,
    logged_out: Mutex<Vec<Credential>>,
    delay: Duration,
    result: Mutex<Result<Credential, String>>,
}

impl FakeRefresher {
    pub fn succeeding(credential: Credential) -> Arc<Self> {
        Self::scripted(Ok(credential), Duration::from_millis(25))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(Err(message.to_owned()), Duration::from_millis(25))
    }

    /// Fails after `delay` instead of the default 25ms.
    pub fn failing_after(message: &str, delay: Duration) -> Arc<Self> {
        Self::scripted(Err(message.to_owned()), delay)
    }

    /// Succeeds after `delay` instead of the default 25ms.
    pub fn slow(credential: Credential, delay: Duration) -> Arc<Self> {
        Self::scripted(Ok(credential), delay)
    }

    fn scripted(result: Result<Credential, String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicU32::new(0),
            logged_out: Mutex::new(vec![]),
            delay,
            result: Mutex::new(result),
        })
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> u32 {
        self.logged_out.lock().len() as u32
    }

    /// Credentials passed to logout, in call order.
    pub fn logged_out(&self) -> Vec<Credential> {
        self.logged_out.lock().clone()
    }
}

impl RefreshClient for FakeRefresher {
    fn refresh(&self) -> BoxFuture<'_, anyhow::Result<Credential>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.result.lock().clone().map_err(|e| anyhow::anyhow!("refresh failed (401): {e}"))
        })
    }

    fn logout(&self, credential: Credential) -> BoxFuture<'_, anyhow::Result<()>> {
        self.logged_out.lock().push(credential);
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(())
        })
    }
}

/// Extension trait to convert any `Display` error into `anyhow::Error`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request pipeline: HTTP leaf, credential attachment, and the 401 gatekeeper.
//!
//! Each stage implements [`Transport`] and wraps the next one, so the stages
//! compose as `Gatekeeper<AttachCredential<HttpTransport>>` and can be tested
//! in isolation.

pub mod attach;
pub mod gatekeeper;
pub mod http;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of the outgoing request pipeline.
///
/// A non-2xx status is returned as `Ok(ApiResponse)`; `Err` means no response
/// was produced at all (connect failure, timeout, malformed URL).
///
/// Object-safe for use as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, anyhow::Result<ApiResponse>> {
        (**self).send(request)
    }
}

/// An outgoing API call. Cheap to clone so it can be replayed after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, optionally with a query string.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Carry the ambient session cookie.
    pub with_credentials: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            with_credentials: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> anyhow::Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Set a URL-encoded form body.
    pub fn form<T: Serialize + ?Sized>(mut self, fields: &T) -> anyhow::Result<Self> {
        let encoded = serde_urlencoded::to_string(fields)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        self.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// Path without query string or trailing slash.
    pub fn route(&self) -> &str {
        normalize_path(&self.path)
    }
}

/// Strip the query string and any trailing slash (keeping a bare `/`).
pub fn normalize_path(path: &str) -> &str {
    let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// A response from the API, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The presented credential was missing, invalid, or expired.
    pub fn is_auth_denied(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

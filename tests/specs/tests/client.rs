// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests of the library client against the fake POS API.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};

use tillgate::client::ApiClient;
use tillgate::config::{CredentialMode, GateConfig};
use tillgate::credential::Credential;
use tillgate::error::ApiError;
use tillgate::redirect::Navigator;
use tillgate::transport::ApiRequest;
use tillgate_specs::{FakePos, PASSWORD};

const USER: &str = "ana@bistro.io";

struct Setup {
    pos: FakePos,
    client: ApiClient,
    nav: Arc<Navigator>,
}

async fn setup(mode: CredentialMode) -> anyhow::Result<Setup> {
    let pos = FakePos::start().await?;
    let mut config = GateConfig::new(pos.base_url());
    config.credential_mode = mode;
    config.request_timeout_ms = 5_000;
    let nav = Arc::new(Navigator::new("/login", "/orders"));
    let client = ApiClient::new(&config, Arc::clone(&nav) as _)?;
    Ok(Setup { pos, client, nav })
}

async fn signed_in(mode: CredentialMode) -> anyhow::Result<Setup> {
    let s = setup(mode).await?;
    s.client.login(USER, PASSWORD).await?;
    Ok(s)
}

fn api_error(err: &anyhow::Error) -> anyhow::Result<&ApiError> {
    err.downcast_ref::<ApiError>().ok_or_else(|| anyhow::anyhow!("not an ApiError: {err:#}"))
}

// -- Sign-in ------------------------------------------------------------------

#[tokio::test]
async fn login_stores_session() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;

    let session = s.client.session().ok_or_else(|| anyhow::anyhow!("no session"))?;
    assert_eq!(session.credential, Some(Credential::Bearer("tok-1".into())));
    assert_eq!(session.principal.map(|p| p.subject).as_deref(), Some(USER));

    let products: Value = s.client.get_json("/products").await?;
    assert_eq!(products, json!([]));
    assert_eq!(s.pos.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_terminal() -> anyhow::Result<()> {
    let s = setup(CredentialMode::Bearer).await?;

    let err = match s.client.login(USER, "wrong").await {
        Ok(_) => anyhow::bail!("login should fail"),
        Err(e) => e,
    };
    let api = api_error(&err)?;
    assert_eq!(api.status, 401);
    assert_eq!(api.detail, "Incorrect username or password");
    assert_eq!(s.pos.refresh_calls(), 0);
    assert_eq!(s.pos.logout_calls(), 0);
    assert_eq!(s.nav.location(), "/login");
    assert!(s.client.session().is_none());
    Ok(())
}

// -- Concurrent expiry ----------------------------------------------------------

#[tokio::test]
async fn concurrent_expiry_refreshes_once() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;
    s.pos.expire_tokens();
    s.pos.set_refresh_delay(Duration::from_millis(300));

    let calls = (0..5).map(|_| s.client.get_json::<Value>("/products"));
    for result in join_all(calls).await {
        assert_eq!(result?, json!([]));
    }

    assert_eq!(s.pos.refresh_calls(), 1);
    assert_eq!(s.pos.product_calls(), 10);
    assert_eq!(s.nav.navigations(), 0);
    let credential = s.client.store().credential();
    assert_eq!(credential, Some(Credential::Bearer("tok-2".into())));
    Ok(())
}

#[tokio::test]
async fn concurrent_expiry_with_failed_refresh_signs_out() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;
    s.pos.expire_tokens();
    s.pos.fail_refresh(true);
    s.pos.set_refresh_delay(Duration::from_millis(300));

    let calls = (0..5).map(|_| s.client.get_json::<Value>("/products"));
    for result in join_all(calls).await {
        let err = match result {
            Ok(v) => anyhow::bail!("expected failure, got {v}"),
            Err(e) => e,
        };
        let api = api_error(&err)?;
        assert_eq!(api.status, 401);
        assert_eq!(api.detail, "Could not validate credentials");
    }

    assert_eq!(s.pos.refresh_calls(), 1);
    assert_eq!(s.pos.logout_calls(), 1);
    assert_eq!(s.nav.navigations(), 1);
    assert_eq!(s.nav.location(), "/login");
    assert!(s.client.session().is_none());
    Ok(())
}

// -- Credential endpoints -------------------------------------------------------

#[tokio::test]
async fn denied_refresh_call_is_not_refreshed() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;
    s.pos.fail_refresh(true);

    let resp = s.client.send(ApiRequest::post("/token/refresh")).await?;
    assert!(resp.is_auth_denied());

    // Only the call above reached the refresh endpoint.
    assert_eq!(s.pos.refresh_calls(), 1);
    assert_eq!(s.pos.logout_calls(), 1);
    assert_eq!(s.nav.navigations(), 1);
    assert!(s.client.session().is_none());
    Ok(())
}

// -- Sequential expiry ----------------------------------------------------------

#[tokio::test]
async fn sequential_expiry_refreshes_each_time() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;

    s.pos.expire_tokens();
    let _: Value = s.client.get_json("/products").await?;
    assert_eq!(s.pos.refresh_calls(), 1);

    s.pos.expire_tokens();
    let _: Value = s.client.get_json("/products").await?;
    assert_eq!(s.pos.refresh_calls(), 2);
    assert_eq!(s.client.store().credential(), Some(Credential::Bearer("tok-3".into())));
    assert_eq!(s.nav.navigations(), 0);
    Ok(())
}

// -- Pass-through ---------------------------------------------------------------

#[tokio::test]
async fn non_auth_failures_pass_through() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;

    let err = match s.client.get_json::<Value>("/reports/daily").await {
        Ok(v) => anyhow::bail!("expected failure, got {v}"),
        Err(e) => e,
    };
    assert_eq!(api_error(&err)?.status, 500);
    assert_eq!(api_error(&err)?.detail, "Report generation failed");

    let err = match s.client.get_json::<Value>("/tenants").await {
        Ok(v) => anyhow::bail!("expected failure, got {v}"),
        Err(e) => e,
    };
    assert_eq!(api_error(&err)?.status, 403);

    let err = match s.client.post_json::<_, Value>("/products", &json!({ "price": 3 })).await {
        Ok(v) => anyhow::bail!("expected failure, got {v}"),
        Err(e) => e,
    };
    assert_eq!(api_error(&err)?.status, 422);

    assert_eq!(s.pos.refresh_calls(), 0);
    assert_eq!(s.nav.navigations(), 0);
    assert!(s.client.session().is_some());
    Ok(())
}

// -- CRUD -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_delete_product() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;

    let created: Value =
        s.client.post_json("/products", &json!({ "name": "Flat white", "price": 420 })).await?;
    assert_eq!(created["id"], 1);

    s.pos.expire_tokens();
    s.client.delete("/products/1").await?;
    assert_eq!(s.pos.refresh_calls(), 1);

    let products: Value = s.client.get_json("/products").await?;
    assert_eq!(products, json!([]));
    Ok(())
}

// -- Cookie mode ----------------------------------------------------------------

#[tokio::test]
async fn cookie_mode_refreshes_ambient_session() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Cookie).await?;
    assert_eq!(s.client.store().credential(), Some(Credential::Ambient));
    let cookies = s.client.cookies_for("/products").unwrap_or_default();
    assert!(cookies.contains("session=tok-1"), "cookies: {cookies}");

    s.pos.expire_tokens();
    let products: Value = s.client.get_json("/products").await?;
    assert_eq!(products, json!([]));
    assert_eq!(s.pos.refresh_calls(), 1);

    let cookies = s.client.cookies_for("/products").unwrap_or_default();
    assert!(cookies.contains("session=tok-2"), "cookies: {cookies}");
    Ok(())
}

// -- Sign-out -------------------------------------------------------------------

#[tokio::test]
async fn logout_revokes_and_redirects() -> anyhow::Result<()> {
    let s = signed_in(CredentialMode::Bearer).await?;

    s.client.logout().await;
    assert_eq!(s.pos.logout_calls(), 1);
    assert!(s.client.session().is_none());
    assert_eq!(s.nav.location(), "/login");

    // Signed out: the next call is denied without a credential to refresh.
    let resp = s.client.send(ApiRequest::get("/products")).await?;
    assert!(resp.is_auth_denied());
    assert_eq!(s.pos.refresh_calls(), 0);
    assert_eq!(s.pos.logout_calls(), 1);
    Ok(())
}

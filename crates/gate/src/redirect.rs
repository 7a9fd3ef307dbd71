// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sign-in redirection and session teardown.

use parking_lot::Mutex;

use crate::credential::refresh::RefreshClient;
use crate::credential::store::SessionStore;

/// Sends the user to the sign-in entry point.
///
/// Must be idempotent: many callers may fail at once and each may redirect.
pub trait Redirector: Send + Sync {
    /// Returns `true` if a navigation happened, `false` if already there.
    fn redirect_to_sign_in(&self) -> bool;
}

struct NavState {
    location: String,
    history: Vec<String>,
}

/// In-process navigation state for a client application.
pub struct Navigator {
    sign_in: String,
    state: Mutex<NavState>,
}

impl Navigator {
    pub fn new(sign_in: impl Into<String>, initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            sign_in: sign_in.into(),
            state: Mutex::new(NavState { location: initial.clone(), history: vec![initial] }),
        }
    }

    pub fn sign_in_location(&self) -> &str {
        &self.sign_in
    }

    pub fn location(&self) -> String {
        self.state.lock().location.clone()
    }

    /// Every location visited, oldest first, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    /// Navigations performed since construction.
    pub fn navigations(&self) -> usize {
        self.state.lock().history.len().saturating_sub(1)
    }

    pub fn navigate(&self, location: impl Into<String>) {
        let location = location.into();
        let mut state = self.state.lock();
        state.location = location.clone();
        state.history.push(location);
    }
}

impl Redirector for Navigator {
    fn redirect_to_sign_in(&self) -> bool {
        let mut state = self.state.lock();
        if state.location == self.sign_in {
            return false;
        }
        tracing::info!(from = %state.location, to = %self.sign_in, "redirecting to sign-in");
        state.location = self.sign_in.clone();
        state.history.push(self.sign_in.clone());
        true
    }
}

/// Tear down the session and send the user to sign-in.
///
/// The session is cleared and the redirect issued before any network call, so
/// requests denied during teardown see no credential. With `revoke`, the
/// server-side logout of the captured credential follows; its failure is
/// logged only.
pub async fn sign_out(
    store: &SessionStore,
    refresher: &dyn RefreshClient,
    redirector: &dyn Redirector,
    revoke: bool,
) {
    let credential = store.credential();
    store.clear();
    redirector.redirect_to_sign_in();
    tracing::info!("signed out");

    if let (true, Some(credential)) = (revoke, credential) {
        if let Err(e) = refresher.logout(credential).await {
            tracing::warn!(err = %e, "logout call failed");
        }
    }
}

#[cfg(test)]
#[path = "redirect_tests.rs"]
mod tests;

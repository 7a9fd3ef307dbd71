// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session store with a change-notification stream.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::credential::{Credential, Principal, Session};

/// Holds the current session. Reads never suspend; writes are visible to every
/// subsequent read.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    change_tx: broadcast::Sender<Option<Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self { current: RwLock::new(None), change_tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.current.read().as_ref().and_then(|s| s.credential.clone())
    }

    pub fn principal(&self) -> Option<Principal> {
        self.current.read().as_ref().and_then(|s| s.principal.clone())
    }

    pub fn set(&self, session: Session) {
        *self.current.write() = Some(session.clone());
        let _ = self.change_tx.send(Some(session));
    }

    /// Replace only the credential after a refresh.
    ///
    /// The principal is re-derived when the new token carries claims, and
    /// kept otherwise.
    pub fn set_credential(&self, credential: Credential) {
        let session = {
            let mut current = self.current.write();
            let principal = credential
                .bearer_token()
                .and_then(Principal::from_jwt)
                .or_else(|| current.as_ref().and_then(|s| s.principal.clone()));
            let session = Session { principal, credential: Some(credential) };
            *current = Some(session.clone());
            session
        };
        let _ = self.change_tx.send(Some(session));
    }

    /// Remove the session. Returns whether a credential was present.
    pub fn clear(&self) -> bool {
        let previous = self.current.write().take();
        let _ = self.change_tx.send(None);
        previous.is_some_and(|s| s.has_credential())
    }

    /// Stream of session changes from now on. Values missed by a slow
    /// subscriber are skipped.
    pub fn changes(&self) -> impl Stream<Item = Option<Session>> + Send + 'static {
        BroadcastStream::new(self.change_tx.subscribe()).filter_map(|r| r.ok())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

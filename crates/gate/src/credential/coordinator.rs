// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight refresh coordination.
//!
//! The first caller to hit an expired credential becomes the *leader* and
//! performs the one refresh for the cycle. Callers that fail while the leader
//! is in flight become *followers* and wait for its outcome. Settling resets
//! the state to idle and drains the waiter set under one lock, so a failure
//! arriving afterwards always starts a new cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Whether a refresh is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Result of a refresh cycle, broadcast to every follower of that cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Carries the refresh error for diagnostics only.
    Failed(String),
    /// The leader went away before the refresh call finished. Nothing is
    /// known about the credential, so followers may bid again.
    Abandoned,
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed)
    }
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<RefreshOutcome>,
}

struct Inner {
    state: RefreshState,
    /// Incremented each time a leader is elected.
    cycle: u64,
    next_waiter_id: u64,
    waiters: Vec<Waiter>,
}

/// Owns the refresh state and the waiter set. Nothing else mutates them.
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

/// Role granted by [`RefreshCoordinator::try_become_leader`].
pub enum Role {
    Leader(LeaderGuard),
    Follower(Follower),
}

impl RefreshCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                cycle: 0,
                next_waiter_id: 0,
                waiters: Vec::new(),
            }),
        })
    }

    /// Check-and-set the refresh state. Never suspends.
    ///
    /// When idle, the caller becomes leader and must settle the cycle (the
    /// returned guard settles with failure if dropped unsettled). Otherwise the
    /// caller joins the in-flight cycle's waiter set.
    pub fn try_become_leader(self: &Arc<Self>) -> Role {
        let mut inner = self.inner.lock();
        match inner.state {
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                inner.cycle += 1;
                let cycle = inner.cycle;
                tracing::debug!(cycle, "refresh leader elected");
                Role::Leader(LeaderGuard { coordinator: Arc::clone(self), cycle, settled: false })
            }
            RefreshState::Refreshing => {
                let (tx, rx) = oneshot::channel();
                let id = inner.next_waiter_id;
                inner.next_waiter_id += 1;
                inner.waiters.push(Waiter { id, tx });
                let cycle = inner.cycle;
                tracing::debug!(cycle, waiters = inner.waiters.len(), "joined in-flight refresh");
                Role::Follower(Follower {
                    coordinator: Arc::clone(self),
                    cycle,
                    id,
                    rx,
                    done: false,
                })
            }
        }
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    pub fn is_refreshing(&self) -> bool {
        self.state() == RefreshState::Refreshing
    }

    /// Followers currently waiting on the in-flight cycle.
    pub fn waiter_count(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Number of leaders elected so far.
    pub fn cycle(&self) -> u64 {
        self.inner.lock().cycle
    }

    fn settle(&self, cycle: u64, outcome: RefreshOutcome) {
        let waiters = {
            let mut inner = self.inner.lock();
            if inner.state == RefreshState::Idle || inner.cycle != cycle {
                return;
            }
            inner.state = RefreshState::Idle;
            std::mem::take(&mut inner.waiters)
        };
        tracing::debug!(cycle, waiters = waiters.len(), ok = outcome.is_refreshed(), "refresh settled");
        for waiter in waiters {
            // Receiver gone means the follower was cancelled mid-delivery.
            let _ = waiter.tx.send(outcome.clone());
        }
    }

    fn remove_waiter(&self, cycle: u64, id: u64) {
        let mut inner = self.inner.lock();
        if inner.cycle == cycle {
            inner.waiters.retain(|w| w.id != id);
        }
    }
}

/// Obligation to perform the refresh for one cycle and report its outcome.
pub struct LeaderGuard {
    coordinator: Arc<RefreshCoordinator>,
    cycle: u64,
    settled: bool,
}

impl LeaderGuard {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Return to idle and deliver `outcome` to every follower of this cycle.
    pub fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(self.cycle, outcome);
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(cycle = self.cycle, "refresh leader dropped before settling");
            self.coordinator.settle(self.cycle, RefreshOutcome::Abandoned);
        }
    }
}

/// A pending wait on another caller's refresh.
///
/// Dropping it before the cycle settles removes its entry from the waiter set.
pub struct Follower {
    coordinator: Arc<RefreshCoordinator>,
    cycle: u64,
    id: u64,
    rx: oneshot::Receiver<RefreshOutcome>,
    done: bool,
}

impl Follower {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Wait for the leader to settle. Returns `None` if `timeout` elapses first.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Option<RefreshOutcome> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.rx).await.ok()?,
            None => (&mut self.rx).await,
        };
        self.done = true;
        Some(received.unwrap_or(RefreshOutcome::Abandoned))
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        if !self.done {
            self.coordinator.remove_waiter(self.cycle, self.id);
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;

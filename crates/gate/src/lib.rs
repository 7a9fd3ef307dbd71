// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-credential gatekeeper for the point-of-sale API.
//!
//! Requests flow through a three-stage pipeline: the HTTP leaf, a stage that
//! attaches the current credential, and the gatekeeper that turns expired
//! credentials into a single shared refresh followed by replays.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod redirect;
pub mod run;
pub mod transport;

#[cfg(test)]
mod test_support;

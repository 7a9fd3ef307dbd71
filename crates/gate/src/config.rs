// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::gatekeeper::AuthEndpoints;

/// How credentials travel to protected endpoints.
///
/// - `Bearer`: an explicit `Authorization: Bearer <token>` header built from
///   the session store.
/// - `Cookie`: the request is marked to carry the ambient session cookie; the
///   token itself is never read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    #[default]
    Bearer,
    Cookie,
}

impl std::fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer => f.write_str("bearer"),
            Self::Cookie => f.write_str("cookie"),
        }
    }
}

/// Configuration for the tillgate client.
#[derive(Debug, Clone, clap::Args)]
pub struct GateConfig {
    /// Base URL of the POS API.
    #[arg(long, default_value = "http://localhost:8020", env = "TILLGATE_API_URL")]
    pub api_url: String,

    /// Credential transport: bearer header or ambient cookie.
    #[arg(long, value_enum, default_value_t = CredentialMode::Bearer, env = "TILLGATE_CREDENTIAL_MODE")]
    pub credential_mode: CredentialMode,

    /// Login endpoint path.
    #[arg(long, default_value = "/token", env = "TILLGATE_LOGIN_PATH")]
    pub login_path: String,

    /// Refresh endpoint path.
    #[arg(long, default_value = "/token/refresh", env = "TILLGATE_REFRESH_PATH")]
    pub refresh_path: String,

    /// Logout endpoint path.
    #[arg(long, default_value = "/logout", env = "TILLGATE_LOGOUT_PATH")]
    pub logout_path: String,

    /// Sign-in location the redirector navigates to.
    #[arg(long, default_value = "/login", env = "TILLGATE_SIGN_IN_PATH")]
    pub sign_in_path: String,

    /// Per-request HTTP timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "TILLGATE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Max time a request waits on another caller's refresh (0 = unbounded).
    #[arg(long, default_value_t = 0, env = "TILLGATE_FOLLOWER_TIMEOUT_MS")]
    pub follower_timeout_ms: u64,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "TILLGATE_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TILLGATE_LOG_LEVEL")]
    pub log_level: String,
}

impl GateConfig {
    /// Config pointing at `api_url` with every other field at its default.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            credential_mode: CredentialMode::Bearer,
            login_path: "/token".to_owned(),
            refresh_path: "/token/refresh".to_owned(),
            logout_path: "/logout".to_owned(),
            sign_in_path: "/login".to_owned(),
            request_timeout_ms: 30000,
            follower_timeout_ms: 0,
            log_format: "text".to_owned(),
            log_level: "warn".to_owned(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an absolute http(s) URL: {}", self.api_url);
        }
        for (flag, path) in [
            ("--login-path", &self.login_path),
            ("--refresh-path", &self.refresh_path),
            ("--logout-path", &self.logout_path),
            ("--sign-in-path", &self.sign_in_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{flag} must start with '/': {path}");
            }
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn endpoints(&self) -> AuthEndpoints {
        AuthEndpoints {
            login: self.login_path.clone(),
            refresh: self.refresh_path.clone(),
            logout: self.logout_path.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `None` when followers wait for the leader without a bound.
    pub fn follower_timeout(&self) -> Option<Duration> {
        match self.follower_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &GateConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
    drop(result);
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line entry point: sign in, issue one API call, return its JSON.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::client::ApiClient;
use crate::config::GateConfig;
use crate::redirect::Navigator;

#[derive(Debug, Parser)]
#[command(name = "tillgate", version, about = "Call the POS API with managed credentials.")]
pub struct Cli {
    #[command(flatten)]
    pub config: GateConfig,

    /// Sign in with this username before the call.
    #[arg(long, env = "TILLGATE_USERNAME", requires = "password")]
    pub username: Option<String>,

    /// Password for --username.
    #[arg(long, env = "TILLGATE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Use an existing access token instead of signing in.
    #[arg(long, env = "TILLGATE_TOKEN", hide_env_values = true, conflicts_with = "username")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// GET a path and print the JSON response.
    Get { path: String },
    /// POST a JSON body.
    Post {
        path: String,
        #[arg(default_value = "{}")]
        body: String,
    },
    /// PUT a JSON body.
    Put {
        path: String,
        #[arg(default_value = "{}")]
        body: String,
    },
    /// DELETE a path.
    Delete { path: String },
}

impl Command {
    pub fn path(&self) -> &str {
        match self {
            Self::Get { path } | Self::Delete { path } => path,
            Self::Post { path, .. } | Self::Put { path, .. } => path,
        }
    }
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.config.validate()?;
        if !self.command.path().starts_with('/') {
            anyhow::bail!("request path must start with '/': {}", self.command.path());
        }
        Ok(())
    }
}

fn parse_body(body: &str) -> anyhow::Result<Value> {
    serde_json::from_str(body).map_err(|e| anyhow::anyhow!("invalid JSON body: {e}"))
}

pub async fn run(cli: Cli) -> anyhow::Result<Value> {
    let body = match &cli.command {
        Command::Post { body, .. } | Command::Put { body, .. } => Some(parse_body(body)?),
        Command::Get { .. } | Command::Delete { .. } => None,
    };

    let navigator = Arc::new(Navigator::new(cli.config.sign_in_path.clone(), "/"));
    let client = ApiClient::new(&cli.config, navigator)?;

    match (&cli.username, &cli.password, &cli.token) {
        (Some(username), Some(password), _) => {
            client.login(username, password).await?;
        }
        (_, _, Some(token)) => client.seed(token.clone()),
        _ => tracing::debug!("no credentials given, calling anonymously"),
    }

    let body = body.unwrap_or(Value::Null);
    match cli.command {
        Command::Get { path } => client.get_json(&path).await,
        Command::Post { path, .. } => client.post_json(&path, &body).await,
        Command::Put { path, .. } => client.put_json(&path, &body).await,
        Command::Delete { path } => {
            client.delete(&path).await?;
            Ok(Value::Null)
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

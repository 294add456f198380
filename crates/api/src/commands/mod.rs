//! Command-line surface over the application context.
//!
//! Every command except `run` performs one coordinator operation and writes
//! its result as pretty JSON.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokenwarden_domain::{AuthToken, Platform};

use crate::context::AppContext;
use crate::utils::logging::{log_health_reports, log_metric, log_operation};

#[derive(Parser, Debug)]
#[command(name = "tokenwarden")]
#[command(about = "Keeps OAuth tokens for several platforms valid")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true, env = "TOKENWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the token health monitor until interrupted
    Run,
    /// Print the health report for every platform
    Status,
    /// Print a valid access token, refreshing it when due
    Token { platform: Platform },
    /// Force a refresh of one or more platforms
    Refresh {
        #[arg(required = true)]
        platforms: Vec<Platform>,
    },
    /// Refresh every stored token that is expired or close to expiry
    RefreshExpired,
    /// Revoke a token with the provider and remove it locally
    Revoke { platform: Platform },
    /// Print the URL a user visits to grant access
    AuthorizeUrl {
        platform: Platform,
        /// Opaque value echoed back to the redirect URI
        #[arg(long)]
        state: String,
    },
    /// Exchange an authorization code for a token
    Exchange { platform: Platform, code: String },
    /// Obtain a token without user interaction
    Authenticate { platform: Platform },
    /// Print the account behind a platform's token
    Whoami { platform: Platform },
    /// Print per-platform metrics and circuit states
    Metrics,
}

impl Command {
    /// Stable identifier used in operation logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Status => "status",
            Self::Token { .. } => "token",
            Self::Refresh { .. } => "refresh",
            Self::RefreshExpired => "refresh_expired",
            Self::Revoke { .. } => "revoke",
            Self::AuthorizeUrl { .. } => "authorize_url",
            Self::Exchange { .. } => "exchange",
            Self::Authenticate { .. } => "authenticate",
            Self::Whoami { .. } => "whoami",
            Self::Metrics => "metrics",
        }
    }
}

/// Execute `command` against `ctx`, writing JSON output to `out`.
pub async fn execute<W: Write>(ctx: &AppContext, command: &Command, out: &mut W) -> anyhow::Result<()> {
    let started = Instant::now();
    let result = dispatch(ctx, command).await;
    log_operation(command.name(), started.elapsed(), result.is_ok());

    if let Some(value) = result? {
        serde_json::to_writer_pretty(&mut *out, &value)?;
        writeln!(out)?;
    }
    Ok(())
}

async fn dispatch(ctx: &AppContext, command: &Command) -> anyhow::Result<Option<Value>> {
    let coordinator = &ctx.coordinator;
    let value = match command {
        Command::Run => {
            run_until_interrupted(ctx).await?;
            return Ok(None);
        }
        Command::Status => {
            let reports = coordinator.get_token_health_report().await?;
            log_health_reports(&reports);
            json!({ "health": ctx.health_check().await, "reports": reports })
        }
        Command::Token { platform } => token_json(&coordinator.get_valid_token(*platform).await?),
        Command::Refresh { platforms } => {
            serde_json::to_value(coordinator.batch_refresh_tokens(platforms).await)?
        }
        Command::RefreshExpired => serde_json::to_value(coordinator.refresh_expired_tokens().await?)?,
        Command::Revoke { platform } => {
            coordinator.revoke_token(*platform).await?;
            json!({ "platform": platform, "revoked": true })
        }
        Command::AuthorizeUrl { platform, state } => {
            json!({ "platform": platform, "url": coordinator.authorization_url(*platform, state)? })
        }
        Command::Exchange { platform, code } => {
            token_json(&coordinator.exchange_authorization_code(*platform, code).await?)
        }
        Command::Authenticate { platform } => {
            token_json(&coordinator.authenticate(*platform).await?)
        }
        Command::Whoami { platform } => serde_json::to_value(coordinator.get_user_info(*platform).await?)?,
        Command::Metrics => metrics_json(ctx),
    };
    Ok(Some(value))
}

/// Start the monitor, wait for Ctrl-C, then stop it.
async fn run_until_interrupted(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.start();
    match ctx.coordinator.get_token_health_report().await {
        Ok(reports) => log_health_reports(&reports),
        Err(err) => tracing::warn!(error = %err, "startup health report unavailable"),
    }
    tracing::info!("tokenwarden running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    ctx.shutdown().await?;

    let metrics = ctx.monitor.metrics();
    log_metric("monitor.total_checks", metrics.total_checks);
    log_metric("monitor.successful_refreshes", metrics.successful_refreshes);
    log_metric("monitor.failed_refreshes", metrics.failed_refreshes);
    Ok(())
}

/// Token view for output. Only the access token is printed; the refresh
/// token never leaves the store.
fn token_json(token: &AuthToken) -> Value {
    json!({
        "platform": token.platform,
        "access_token": token.access_token,
        "token_type": token.token_type,
        "expires_at": token.expires_at,
        "scopes": token.scopes,
        "user_id": token.user_id,
    })
}

fn metrics_json(ctx: &AppContext) -> Value {
    let circuits: serde_json::Map<String, Value> = ctx
        .coordinator
        .circuit_status()
        .into_iter()
        .map(|(platform, snapshot)| {
            (
                platform.to_string(),
                json!({
                    "state": snapshot.state.to_string(),
                    "failure_count": snapshot.failure_count,
                    "retry_in_secs": snapshot.retry_in.map(|d| d.as_secs()),
                }),
            )
        })
        .collect();

    json!({
        "platforms": ctx.coordinator.all_metrics(),
        "circuits": circuits,
        "monitor": ctx.monitor.metrics(),
    })
}

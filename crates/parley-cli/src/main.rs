//! Parley terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Sign in from the session file written by the web login
//! parley --server ws://localhost:8080/ws --api http://localhost:8080/api \
//!     --session ~/.config/parley/session.json
//!
//! # Or name the user directly
//! parley --user-id 7 --username sam
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use parley_app::Runtime;
use parley_cli::{StdioDriver, SystemEnv, session};
use parley_client::{Client, ConnectionConfig, ReconnectPolicy, rest::RestClient};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Terminal client for the Parley chat service")]
#[command(version)]
struct Args {
    /// Broker WebSocket URL
    #[arg(long, env = "PARLEY_SERVER", default_value = "ws://localhost:8080/ws")]
    server: String,

    /// REST API root
    #[arg(long, env = "PARLEY_API", default_value = "http://localhost:8080/api")]
    api: String,

    /// Session file written by the web login
    #[arg(long, env = "PARLEY_SESSION")]
    session: Option<PathBuf>,

    /// User id (overrides the session file)
    #[arg(long)]
    user_id: Option<u64>,

    /// Display name (overrides the session file)
    #[arg(long)]
    username: Option<String>,

    /// Heart-beat interval in milliseconds
    #[arg(long, default_value = "4000")]
    heartbeat_ms: u64,

    /// Base reconnect delay in milliseconds
    #[arg(long, default_value = "5000")]
    reconnect_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let identity = session::resolve(args.session.as_deref(), args.user_id, args.username)?;
    tracing::info!(user_id = identity.user_id, username = %identity.username, "signed in");

    let config = ConnectionConfig {
        host: host_of(&args.server),
        login: Some(identity.user_id.to_string()),
        heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
        reconnect: ReconnectPolicy {
            base: Duration::from_millis(args.reconnect_ms),
            ..ReconnectPolicy::default()
        },
        ..ConnectionConfig::default()
    };

    let history = Arc::new(RestClient::new(args.api));
    let driver = StdioDriver::new(args.server, history);
    let client = Client::new(SystemEnv::new(), identity, config);

    Ok(Runtime::new(driver, client).run().await?)
}

/// Host part of a WebSocket URL, for the CONNECT `host` header.
fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    authority.rsplit_once(':').map_or(authority, |(host, _)| host).to_string()
}

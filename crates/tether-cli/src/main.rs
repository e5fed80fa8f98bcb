//! tether: talk to a duplex RPC peer from the command line.
//!
//!   tether --url http://127.0.0.1:8001 request GET /v1/ping
//!   tether --config tether.toml listen --status 200

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tether_client::{TransportConfig, TransportSettings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether", version, about)]
struct Cli {
    /// TOML settings file; flags below override it.
    #[arg(long, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL (http, https, ws or wss).
    #[arg(long, env = "TETHER_URL")]
    url: Option<String>,

    /// `login:password` sent as query parameters on connect.
    #[arg(long, env = "TETHER_CREDENTIALS", hide_env_values = true)]
    credentials: Option<String>,

    /// Client agent tag.
    #[arg(long, default_value = concat!("tether-cli/", env!("CARGO_PKG_VERSION")))]
    agent: String,

    /// Seconds between keepalive probes.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    keepalive_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one request and print the response.
    Request {
        verb: String,
        path: String,
        /// Request body, sent as UTF-8.
        #[arg(long)]
        body: Option<String>,
        /// `Name:value`, repeatable.
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Print requests from the peer and answer each one.
    Listen {
        /// Status to answer with.
        #[arg(long, default_value_t = 200)]
        status: u32,
        /// Exit after this many requests.
        #[arg(long)]
        count: Option<usize>,
    },
}

impl Cli {
    fn transport_config(&self) -> anyhow::Result<TransportConfig> {
        let mut config = match &self.config {
            Some(path) => TransportConfig::from_settings(TransportSettings::load(path)?)?,
            None => TransportConfig::new(String::new()),
        };
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if config.base_url.is_empty() {
            anyhow::bail!("no server URL; pass --url or set base_url in --config");
        }
        if let Some(credentials) = &self.credentials {
            config = config.with_credentials(credentials.parse()?);
        }
        if let Some(secs) = self.keepalive_secs {
            config = config.with_keepalive_interval(Duration::from_secs(secs));
        }
        Ok(config.with_agent(self.agent.clone()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tether=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.transport_config()?;

    match cli.command {
        Command::Request {
            verb,
            path,
            body,
            headers,
            timeout_secs,
        } => {
            commands::request(
                config,
                commands::RequestArgs {
                    verb,
                    path,
                    body,
                    headers,
                    timeout: Duration::from_secs(timeout_secs),
                },
            )
            .await
        }
        Command::Listen { status, count } => commands::listen(config, status, count).await,
    }
}

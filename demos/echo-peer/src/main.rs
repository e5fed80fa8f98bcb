//! Echo peer for trying the transport by hand.
//!
//! Accepts client sockets on `/v1/websocket/`, answers keepalives, echoes
//! every other request body back with status 200, and can push its own
//! requests to the client on a timer.
//!
//!   cargo run -p tether-demo-echo-peer -- --port 8001 --push 5
//!   tether --url http://127.0.0.1:8001 request PUT /v1/echo --body hello

mod server;

use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tether_demo_echo_peer=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port = parse_arg(&args, "--port").unwrap_or(8001);
    let push = parse_arg(&args, "--push").map(|secs| Duration::from_secs(secs.into()));
    let reject = parse_arg(&args, "--reject");

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();

    if let Some(every) = push {
        tracing::info!("Pushing a request every {:?}", every);
    }
    if let Some(status) = reject {
        tracing::info!("Rejecting every handshake with {}", status);
    }

    server::run(addr, server::Options { push, reject }).await
}

fn parse_arg(args: &[String], flag: &str) -> Option<u16> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

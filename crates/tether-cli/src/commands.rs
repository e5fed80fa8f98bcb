//! Subcommand implementations.

use anyhow::Context;
use std::time::Duration;
use tether_client::{ConnectionEvent, TransportConfig, TransportError, WebSocketConnection};
use tether_core::{RequestMessage, ResponseMessage};
use tokio::sync::broadcast;

/// How long to wait for the first successful connect.
const CONNECT_WAIT: Duration = Duration::from_secs(30);

/// How long one `listen` poll blocks before checking again.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct RequestArgs {
    pub verb: String,
    pub path: String,
    pub body: Option<String>,
    pub headers: Vec<String>,
    pub timeout: Duration,
}

pub async fn request(config: TransportConfig, args: RequestArgs) -> anyhow::Result<()> {
    let connection = WebSocketConnection::new(config);
    wait_connected(&connection).await?;

    let mut request = RequestMessage::new(args.verb.to_uppercase(), args.path);
    request.headers = args.headers;
    request.body = args.body.map(String::into_bytes);

    let response = connection
        .send_request(request)?
        .with_timeout(args.timeout)
        .await
        .context("request failed")?;

    print_response(&response);
    connection.disconnect().await;

    if !response.is_success() {
        anyhow::bail!("server answered {}", response.status);
    }
    Ok(())
}

pub async fn listen(config: TransportConfig, status: u32, count: Option<usize>) -> anyhow::Result<()> {
    let connection = WebSocketConnection::new(config);
    let mut events = connection.subscribe();
    wait_connected(&connection).await?;

    let mut answered = 0;
    while count.is_none_or(|count| answered < count) {
        match connection.poll_request(POLL_INTERVAL).await {
            Ok(request) => {
                println!(
                    "{} {} (id {}, {} bytes)",
                    request.verb,
                    request.path,
                    request.id,
                    request.body.as_ref().map_or(0, Vec::len)
                );
                let mut response = ResponseMessage::new(request.id, status);
                if status == 200 {
                    response = response.with_message("OK");
                }
                if let Err(error) = connection.send_response(response) {
                    tracing::warn!(%error, id = request.id, "response not sent");
                }
                answered += 1;
            }
            Err(TransportError::TimedOut) => {}
            Err(TransportError::ConnectionClosed) => {
                tracing::info!("connection lost, waiting for reconnect");
                wait_for_event(&mut events, ConnectionEvent::Connected).await?;
            }
            Err(error) => return Err(error.into()),
        }
    }

    connection.disconnect().await;
    Ok(())
}

async fn wait_connected(connection: &WebSocketConnection) -> anyhow::Result<()> {
    let mut events = connection.subscribe();
    connection.connect();
    tokio::time::timeout(CONNECT_WAIT, wait_for_event(&mut events, ConnectionEvent::Connected))
        .await
        .context("timed out connecting")?
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<ConnectionEvent>,
    wanted: ConnectionEvent,
) -> anyhow::Result<()> {
    loop {
        match events.recv().await {
            Ok(event) if event == wanted => return Ok(()),
            Ok(ConnectionEvent::AuthenticationFailed { status }) => {
                anyhow::bail!("credentials rejected (HTTP {status})");
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => anyhow::bail!("connection dropped"),
        }
    }
}

fn print_response(response: &ResponseMessage) {
    match &response.message {
        Some(message) => println!("{} {}", response.status, message),
        None => println!("{}", response.status),
    }
    for header in &response.headers {
        println!("{header}");
    }
    if let Some(body) = &response.body {
        println!();
        println!("{}", String::from_utf8_lossy(body));
    }
}

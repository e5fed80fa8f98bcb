//! Echo peer implementation.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tether_core::{Envelope, KEEPALIVE_PATH, RequestMessage, ResponseMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Send a request to each client this often.
    pub push: Option<Duration>,
    /// Refuse every handshake with this HTTP status.
    pub reject: Option<u16>,
}

pub async fn run(addr: SocketAddr, options: Options) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, client_addr, options).await {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    options: Options,
) -> anyhow::Result<()> {
    let callback = |request: &Request, response: Response| {
        let login = request
            .uri()
            .query()
            .and_then(|query| query.split('&').find_map(|pair| pair.strip_prefix("login=")))
            .unwrap_or("<anonymous>")
            .to_string();
        let agent = request
            .headers()
            .get("X-Client-Agent")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("<none>")
            .to_string();
        tracing::info!("Handshake from {} as {} (agent {})", addr, login, agent);

        match options.reject {
            Some(status) => {
                let mut rejection = ErrorResponse::new(None);
                *rejection.status_mut() =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
                Err(rejection)
            }
            None => Ok(response),
        }
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let (mut sink, mut stream) = ws.split();

    let mut push = interval(options.push.unwrap_or(Duration::from_secs(3600)));
    push.set_missed_tick_behavior(MissedTickBehavior::Delay);
    push.tick().await;
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                let bytes = match msg {
                    Message::Binary(bytes) => bytes,
                    Message::Close(frame) => {
                        tracing::debug!("Close from {}: {:?}", addr, frame);
                        break;
                    }
                    _ => continue,
                };

                match tether_core::decode(&bytes) {
                    Ok(Envelope::Request(request)) => {
                        let response = answer(&request);
                        let frame = tether_core::encode(&response.into())?;
                        sink.send(Message::Binary(frame.into())).await?;
                    }
                    Ok(Envelope::Response(response)) => {
                        tracing::info!("Client answered #{} with {}", response.id, response.status);
                    }
                    Err(e) => {
                        tracing::warn!("Invalid frame: {}", e);
                    }
                }
            }

            _ = push.tick(), if options.push.is_some() => {
                next_id += 1;
                let request = RequestMessage::new("PUT", "/api/v1/message")
                    .with_header("X-Signal-Timestamp", &next_id.to_string())
                    .with_body(format!("push #{next_id}").into_bytes());
                let request = RequestMessage { id: next_id, ..request };
                let frame = tether_core::encode(&request.into())?;
                sink.send(Message::Binary(frame.into())).await?;
                tracing::info!("Pushed request #{} to {}", next_id, addr);
            }
        }
    }

    tracing::debug!("Connection closed: {}", addr);
    Ok(())
}

/// Keepalives get a bare 200, everything else gets its body back.
fn answer(request: &RequestMessage) -> ResponseMessage {
    if request.path == KEEPALIVE_PATH {
        tracing::debug!("Keepalive #{}", request.id);
        return ResponseMessage::ok(request.id);
    }
    tracing::info!("{} {} (#{})", request.verb, request.path, request.id);
    let response = ResponseMessage::ok(request.id);
    match &request.body {
        Some(body) => response.with_body(body.clone()),
        None => response,
    }
}

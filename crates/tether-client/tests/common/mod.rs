//! In-process remote peer for driving the transport over a real socket.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tether_client::{ConnectionEvent, ReconnectPolicy, TransportConfig};
use tether_core::{Envelope, RequestMessage, ResponseMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

pub const WAIT: Duration = Duration::from_secs(5);

/// What the client sent in its opening handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub headers: http::HeaderMap,
    pub at: Instant,
}

impl Handshake {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct MockPeer {
    pub addr: SocketAddr,
    sockets: mpsc::UnboundedReceiver<PeerSocket>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    rejections: Arc<Mutex<VecDeque<u16>>>,
}

impl MockPeer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (socket_tx, sockets) = mpsc::unbounded_channel();
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let rejections = Arc::new(Mutex::new(VecDeque::new()));

        let seen = handshakes.clone();
        let reject = rejections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = seen.clone();
                let reject = reject.clone();
                let socket_tx = socket_tx.clone();
                tokio::spawn(async move {
                    let callback = move |request: &Request, response: Response| {
                        seen.lock().unwrap().push(Handshake {
                            uri: request.uri().to_string(),
                            headers: request.headers().clone(),
                            at: Instant::now(),
                        });
                        match reject.lock().unwrap().pop_front() {
                            Some(status) => {
                                let rejection: ErrorResponse =
                                    http::Response::builder().status(status).body(None).unwrap();
                                Err(rejection)
                            }
                            None => Ok(response),
                        }
                    };
                    if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                        let _ = socket_tx.send(PeerSocket { ws });
                    }
                });
            }
        });

        Self {
            addr,
            sockets,
            handshakes,
            rejections,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Config pointing at this peer, with a quick reconnect.
    pub fn config(&self) -> TransportConfig {
        TransportConfig::new(self.base_url()).with_reconnect_policy(ReconnectPolicy {
            step: Duration::from_millis(20),
            max: Duration::from_millis(200),
        })
    }

    /// Reject the next handshake with `status`.
    pub fn reject_next(&self, status: u16) {
        self.rejections.lock().unwrap().push_back(status);
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }

    pub async fn accept(&mut self) -> PeerSocket {
        timeout(WAIT, self.sockets.recv())
            .await
            .expect("no connection arrived")
            .expect("listener stopped")
    }

    /// Assert nobody connects within `window`.
    pub async fn expect_no_connection(&mut self, window: Duration) {
        if let Ok(Some(_)) = timeout(window, self.sockets.recv()).await {
            panic!("unexpected connection");
        }
    }
}

pub struct PeerSocket {
    ws: WebSocketStream<TcpStream>,
}

impl PeerSocket {
    /// Next decoded frame. Panics on close or timeout.
    pub async fn recv(&mut self) -> Envelope {
        loop {
            let message = timeout(WAIT, self.ws.next())
                .await
                .expect("no frame arrived")
                .expect("socket ended")
                .expect("socket error");
            match message {
                Message::Binary(bytes) => return tether_core::decode(&bytes).unwrap(),
                Message::Close(frame) => panic!("socket closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    pub async fn recv_request(&mut self) -> RequestMessage {
        match self.recv().await {
            Envelope::Request(request) => request,
            other => panic!("expected request, got {other:?}"),
        }
    }

    pub async fn recv_response(&mut self) -> ResponseMessage {
        match self.recv().await {
            Envelope::Response(response) => response,
            other => panic!("expected response, got {other:?}"),
        }
    }

    pub async fn send(&mut self, envelope: impl Into<Envelope>) {
        let bytes = tether_core::encode(&envelope.into()).unwrap();
        self.ws.send(Message::Binary(bytes.into())).await.unwrap();
    }

    pub async fn send_raw(&mut self, message: Message) {
        self.ws.send(message).await.unwrap();
    }

    /// Wait for the client's close frame.
    pub async fn expect_close(&mut self) -> Option<CloseFrame> {
        loop {
            let message = timeout(WAIT, self.ws.next())
                .await
                .expect("socket stayed open")
                .expect("socket ended without close frame")
                .expect("socket error");
            if let Message::Close(frame) = message {
                return frame;
            }
        }
    }

    /// Assert no data frame arrives within `window`. A close or the end of
    /// the stream is fine.
    pub async fn expect_quiet(&mut self, window: Duration) {
        let _ = timeout(window, async {
            while let Some(Ok(message)) = self.ws.next().await {
                if let Message::Binary(bytes) = message {
                    let frame = tether_core::decode(&bytes);
                    panic!("unexpected frame: {frame:?}");
                }
            }
        })
        .await;
    }

    /// Close from the peer side with a close frame.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

pub async fn wait_for(events: &mut broadcast::Receiver<ConnectionEvent>, wanted: ConnectionEvent) {
    let found = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if event == wanted => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await;
    assert!(found.is_ok(), "never saw {wanted:?}");
}

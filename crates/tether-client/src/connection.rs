//! Connection lifecycle.
//!
//! [`WebSocketConnection`] owns the socket. A supervisor task per
//! `connect()` opens it, reads frames until it goes away, and reconnects
//! after a back-off unless told to stop. A writer task per socket drains
//! the outbound channel into the sink; nothing else touches the socket.
//!
//! All shared state (lifecycle state, pending outgoing requests, incoming
//! queue, outbound channel) sits behind one mutex. Callers never hold it
//! across an await. Sessions are tagged with an epoch; `connect()`,
//! `disconnect()` and drop advance it, and a task whose epoch is stale
//! leaves the shared state alone.

use crate::config::{AGENT_HEADER, TransportConfig};
use crate::error::{ConnectError, TransportError};
use crate::keepalive;
use crate::queue::IncomingRequestQueue;
use crate::tracker::{OutgoingRequestTracker, ResponseHandle};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_core::{
    ConnectionState, Envelope, KEEPALIVE_PATH, KEEPALIVE_VERB, RequestMessage, ResponseMessage,
};
use tokio::net::TcpStream;
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Host;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect()` waits for the close frame to go out.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 32;

/// Lifecycle notifications for collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connecting,
    Connected,
    Disconnected,
    /// The handshake was rejected with 401/403. Reconnects continue until
    /// `disconnect()`; retrying with the same credentials will not help.
    AuthenticationFailed { status: u16 },
}

/// Why a socket session ended.
#[derive(Debug)]
enum SessionEnd {
    ConnectFailed(ConnectError),
    ClosedByPeer(Option<CloseFrame>),
    ReadFailed(tungstenite::Error),
    WriteFailed(tungstenite::Error),
    /// The writer stopped because the outbound channel was dropped locally.
    ClosedLocally,
    /// A newer epoch took over before this session was installed.
    Superseded,
}

struct Shared {
    state: ConnectionState,
    epoch: u64,
    failures: u32,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    writer: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
    tracker: OutgoingRequestTracker,
    incoming: IncomingRequestQueue,
}

struct Inner {
    config: TransportConfig,
    shared: Mutex<Shared>,
    /// Woken on every enqueue and state change.
    wake: Notify,
    events: broadcast::Sender<ConnectionEvent>,
    epoch: watch::Sender<u64>,
}

/// A persistent, reconnecting duplex RPC connection.
///
/// Outgoing calls go through [`send_request`](Self::send_request); requests
/// from the peer are read one at a time with
/// [`poll_request`](Self::poll_request) and answered with
/// [`send_response`](Self::send_response).
///
/// Dropping the connection stops reconnecting and fails whatever is pending.
pub struct WebSocketConnection {
    inner: Arc<Inner>,
}

impl WebSocketConnection {
    pub fn new(config: TransportConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (epoch, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    failures: 0,
                    outbound: None,
                    writer: None,
                    keepalive: None,
                    tracker: OutgoingRequestTracker::new(),
                    incoming: IncomingRequestQueue::new(),
                }),
                wake: Notify::new(),
                events,
                epoch,
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// True while disconnected or closing.
    pub fn is_dead(&self) -> bool {
        self.state().is_dead()
    }

    /// Consecutive failed sessions since the last successful connect.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Outgoing requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.lock().tracker.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Start connecting in the background. No-op while connecting or
    /// connected. Must be called within a Tokio runtime.
    pub fn connect(&self) {
        let mut shared = self.inner.lock();
        if matches!(
            shared.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }
        let epoch = self.inner.advance_epoch(&mut shared);
        self.inner.set_state(&mut shared, ConnectionState::Connecting);
        tracing::info!(epoch, url = %self.inner.config.base_url, "connecting");
        tokio::spawn(supervise(self.inner.clone(), epoch));
    }

    /// Close the socket with a normal closure and stop reconnecting. Every
    /// pending request fails with `ConnectionClosed`.
    pub async fn disconnect(&self) {
        let writer = {
            let mut shared = self.inner.lock();
            self.inner.advance_epoch(&mut shared);
            if shared.state == ConnectionState::Disconnected {
                return;
            }
            tracing::info!("disconnecting");
            self.inner.set_state(&mut shared, ConnectionState::Closing);
            self.inner.teardown(&mut shared);
            shared.writer.take()
        };

        if let Some(mut writer) = writer {
            if time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
                tracing::debug!("close frame not flushed in time");
                writer.abort();
            }
        }

        let mut shared = self.inner.lock();
        if shared.state == ConnectionState::Closing {
            self.inner.set_state(&mut shared, ConnectionState::Disconnected);
        }
    }

    /// Send a request to the peer. Fails immediately with `NotConnected`
    /// unless connected. The id field of `request` is overwritten.
    pub fn send_request(&self, request: RequestMessage) -> Result<ResponseHandle, TransportError> {
        let mut shared = self.inner.lock();
        let outbound = shared.outbound()?;

        let (id, handle) = shared.tracker.register();
        let envelope = Envelope::Request(RequestMessage { id, ..request });
        let bytes = match tether_core::encode(&envelope) {
            Ok(bytes) => bytes,
            Err(error) => {
                shared.tracker.cancel(id);
                return Err(error.into());
            }
        };
        // If the writer is gone the session is already ending; the entry is
        // failed with the rest when it does.
        let _ = outbound.send(Message::Binary(bytes.into()));
        tracing::debug!(id, "request sent");
        Ok(handle)
    }

    /// Answer a request previously returned by `poll_request`.
    pub fn send_response(&self, response: ResponseMessage) -> Result<(), TransportError> {
        let shared = self.inner.lock();
        let outbound = shared.outbound()?;
        let id = response.id;
        let bytes = tether_core::encode(&Envelope::Response(response))?;
        outbound
            .send(Message::Binary(bytes.into()))
            .map_err(|_| TransportError::ConnectionClosed)?;
        tracing::debug!(id, "response sent");
        Ok(())
    }

    /// Send a keepalive probe now. Does nothing unless connected.
    pub fn send_keepalive(&self) {
        self.inner.send_keepalive(None);
    }

    /// Wait up to `timeout` for the next request from the peer.
    ///
    /// While connecting, keeps waiting. Once the connection is down, returns
    /// `ConnectionClosed` (immediately, if it already was). A zero timeout
    /// returns `TimedOut` without looking at the queue.
    pub async fn poll_request(&self, timeout: Duration) -> Result<RequestMessage, TransportError> {
        if timeout.is_zero() {
            return Err(TransportError::TimedOut);
        }
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.inner.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut shared = self.inner.lock();
                if let Some(request) = shared.incoming.pop() {
                    return Ok(request);
                }
                if !shared.state.can_receive() {
                    return Err(TransportError::ConnectionClosed);
                }
            }

            if time::timeout_at(deadline, notified).await.is_err() {
                return Err(TransportError::TimedOut);
            }
        }
    }

    /// Take the next request from the peer if one is already queued.
    pub fn read_request_if_available(&self) -> Option<RequestMessage> {
        self.inner.lock().incoming.pop()
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        let mut shared = self.inner.lock();
        self.inner.advance_epoch(&mut shared);
        if shared.state != ConnectionState::Disconnected {
            self.inner.teardown(&mut shared);
            self.inner.set_state(&mut shared, ConnectionState::Disconnected);
        }
    }
}

impl Shared {
    fn outbound(&self) -> Result<mpsc::UnboundedSender<Message>, TransportError> {
        match (&self.state, &self.outbound) {
            (ConnectionState::Connected, Some(outbound)) => Ok(outbound.clone()),
            _ => Err(TransportError::NotConnected),
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance_epoch(&self, shared: &mut Shared) -> u64 {
        shared.epoch += 1;
        self.epoch.send_replace(shared.epoch);
        shared.epoch
    }

    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        shared.state = state;
        let event = match state {
            ConnectionState::Connecting => Some(ConnectionEvent::Connecting),
            ConnectionState::Connected => Some(ConnectionEvent::Connected),
            ConnectionState::Disconnected => Some(ConnectionEvent::Disconnected),
            ConnectionState::Closing => None,
        };
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
        self.wake.notify_waiters();
    }

    /// Stop the keepalive, release the socket, fail pending requests and
    /// drop unread incoming ones.
    fn teardown(&self, shared: &mut Shared) {
        if let Some(keepalive) = shared.keepalive.take() {
            keepalive.abort();
        }
        shared.outbound = None;
        let failed = shared.tracker.fail_all(TransportError::ConnectionClosed);
        let dropped = shared.incoming.clear();
        if failed > 0 || dropped > 0 {
            tracing::info!(failed, dropped, "pending requests released");
        }
    }

    /// Install a freshly opened socket. Returns false if the epoch moved on
    /// while the handshake was running.
    fn session_opened(
        self: &Arc<Self>,
        epoch: u64,
        outbound: mpsc::UnboundedSender<Message>,
        writer: JoinHandle<()>,
    ) -> bool {
        let mut shared = self.lock();
        if shared.epoch != epoch || shared.state != ConnectionState::Connecting {
            // Dropping `outbound` makes the writer close the socket.
            return false;
        }

        let weak = Arc::downgrade(self);
        let probe = move || {
            weak.upgrade()
                .is_some_and(|inner| inner.send_keepalive(Some(epoch)))
        };

        shared.failures = 0;
        shared.outbound = Some(outbound);
        shared.writer = Some(writer);
        shared.keepalive = Some(keepalive::spawn(self.config.keepalive_interval, probe));
        self.set_state(&mut shared, ConnectionState::Connected);
        tracing::info!(epoch, "connected");
        true
    }

    /// Record the end of a session. Returns the back-off before the next
    /// attempt, or `None` if this session's epoch is over.
    fn session_ended(&self, epoch: u64, end: SessionEnd) -> Option<Duration> {
        let mut shared = self.lock();
        if shared.epoch != epoch {
            return None;
        }

        let mut auth_status = None;
        match &end {
            SessionEnd::ConnectFailed(ConnectError::Authentication { status }) => {
                tracing::warn!(status, "authentication rejected");
                auth_status = Some(*status);
            }
            SessionEnd::ConnectFailed(error) => tracing::warn!(%error, "connect failed"),
            SessionEnd::ClosedByPeer(Some(frame)) => {
                tracing::info!(code = u16::from(frame.code), reason = &*frame.reason, "closed by peer");
            }
            SessionEnd::ClosedByPeer(None) => tracing::info!("socket closed"),
            SessionEnd::ReadFailed(error) => tracing::warn!(%error, "read failed"),
            SessionEnd::WriteFailed(error) => tracing::warn!(%error, "write failed"),
            SessionEnd::ClosedLocally | SessionEnd::Superseded => {
                tracing::debug!(?end, "session ended");
            }
        }

        self.teardown(&mut shared);
        shared.writer = None;
        shared.failures = shared.failures.saturating_add(1);
        self.set_state(&mut shared, ConnectionState::Disconnected);
        if let Some(status) = auth_status {
            let _ = self.events.send(ConnectionEvent::AuthenticationFailed { status });
        }
        Some(self.config.reconnect.delay(shared.failures))
    }

    /// Move from the back-off back to connecting. False if the epoch is over
    /// or someone else already did.
    fn begin_attempt(&self, epoch: u64) -> bool {
        let mut shared = self.lock();
        if shared.epoch != epoch || shared.state != ConnectionState::Disconnected {
            return false;
        }
        self.set_state(&mut shared, ConnectionState::Connecting);
        true
    }

    /// Route one binary frame from the reader.
    fn dispatch(&self, epoch: u64, bytes: &[u8]) {
        let envelope = match tether_core::decode(bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(%error, len = bytes.len(), "dropping malformed frame");
                return;
            }
        };

        let mut shared = self.lock();
        if shared.epoch != epoch || shared.state != ConnectionState::Connected {
            return;
        }
        match envelope {
            Envelope::Request(request) => {
                tracing::debug!(id = request.id, verb = %request.verb, path = %request.path, "incoming request");
                shared.incoming.push(request);
                self.wake.notify_waiters();
            }
            Envelope::Response(response) => {
                let id = response.id;
                if !shared.tracker.resolve(response) {
                    tracing::debug!(id, "dropping unmatched response");
                }
            }
        }
    }

    /// Queue a keepalive probe. With `Some(epoch)`, only for that session.
    /// Returns false when there is no session to probe.
    fn send_keepalive(&self, epoch: Option<u64>) -> bool {
        let mut shared = self.lock();
        if epoch.is_some_and(|epoch| epoch != shared.epoch) {
            return false;
        }
        let Ok(outbound) = shared.outbound() else {
            return false;
        };

        let id = shared.tracker.next_id();
        let probe = RequestMessage {
            id,
            ..RequestMessage::new(KEEPALIVE_VERB, KEEPALIVE_PATH)
        };
        match tether_core::encode(&Envelope::Request(probe)) {
            Ok(bytes) => {
                tracing::debug!(id, "keepalive");
                outbound.send(Message::Binary(bytes.into())).is_ok()
            }
            Err(error) => {
                tracing::warn!(%error, "failed to encode keepalive");
                false
            }
        }
    }
}

/// Connect, read until the socket dies, back off, repeat, for as long as
/// `epoch` is current.
async fn supervise(inner: Arc<Inner>, epoch: u64) {
    let mut epoch_rx = inner.epoch.subscribe();
    loop {
        let end = tokio::select! {
            end = run_session(&inner, epoch) => end,
            _ = epoch_over(&mut epoch_rx, epoch) => return,
        };

        let Some(delay) = inner.session_ended(epoch, end) else {
            return;
        };
        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting after back-off");

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = epoch_over(&mut epoch_rx, epoch) => return,
        }
        if !inner.begin_attempt(epoch) {
            return;
        }
    }
}

async fn epoch_over(epoch_rx: &mut watch::Receiver<u64>, epoch: u64) {
    let _ = epoch_rx.wait_for(|current| *current != epoch).await;
}

async fn run_session(inner: &Arc<Inner>, epoch: u64) -> SessionEnd {
    let socket = match open_socket(&inner.config).await {
        Ok(socket) => socket,
        Err(error) => return SessionEnd::ConnectFailed(error),
    };
    let (sink, stream) = socket.split();
    drive(inner, epoch, sink, stream).await
}

/// Run one opened socket: install it, dispatch what it reads, and report
/// how it ended.
async fn drive<W, R>(inner: &Arc<Inner>, epoch: u64, sink: W, mut stream: R) -> SessionEnd
where
    W: Sink<Message, Error = tungstenite::Error> + Send + Unpin + 'static,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (failed_tx, mut failed_rx) = oneshot::channel();
    let writer = tokio::spawn(write_frames(sink, outbound_rx, failed_tx));
    if !inner.session_opened(epoch, outbound_tx, writer) {
        return SessionEnd::Superseded;
    }

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Binary(bytes))) => inner.dispatch(epoch, &bytes),
                Some(Ok(Message::Close(frame))) => return SessionEnd::ClosedByPeer(frame),
                Some(Ok(Message::Text(_))) => tracing::warn!("ignoring text frame"),
                Some(Ok(_)) => {}
                Some(Err(error)) => return SessionEnd::ReadFailed(error),
                None => return SessionEnd::ClosedByPeer(None),
            },
            failure = &mut failed_rx => {
                return match failure {
                    Ok(error) => SessionEnd::WriteFailed(error),
                    Err(_) => SessionEnd::ClosedLocally,
                };
            }
        }
    }
}

/// Drain `outbound` into the socket. A write error is reported through
/// `failed`; a dropped channel means a local close.
async fn write_frames<W>(
    mut sink: W,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    failed: oneshot::Sender<tungstenite::Error>,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(error) = sink.send(message).await {
            let _ = failed.send(error);
            return;
        }
    }

    let close = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    if let Err(error) = sink.send(Message::Close(Some(close))).await {
        tracing::debug!(%error, "close frame not sent");
    }
    let _ = sink.close().await;
}

async fn open_socket(config: &TransportConfig) -> Result<Socket, ConnectError> {
    let url = config.endpoint()?;
    let host = url
        .host()
        .ok_or_else(|| ConnectError::InvalidEndpoint(format!("{url} has no host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConnectError::InvalidEndpoint(format!("{url} has no port")))?;

    let mut request = url.as_str().into_client_request()?;
    if let Some(agent) = &config.agent {
        let value = HeaderValue::from_str(agent)
            .map_err(|e| ConnectError::InvalidEndpoint(format!("agent tag: {e}")))?;
        request.headers_mut().insert(AGENT_HEADER, value);
    }
    for interceptor in &config.interceptors {
        interceptor.intercept(&mut request);
    }

    let connect = async {
        let addrs = resolve(config, host, port).await?;
        let stream = TcpStream::connect(addrs.as_slice()).await?;
        stream.set_nodelay(true)?;
        let (socket, _response) = tokio_tungstenite::client_async_tls_with_config(
            request,
            stream,
            None,
            config.tls.clone(),
        )
        .await?;
        Ok::<_, ConnectError>(socket)
    };

    time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| ConnectError::Timeout)?
}

async fn resolve(
    config: &TransportConfig,
    host: Host<&str>,
    port: u16,
) -> Result<Vec<SocketAddr>, ConnectError> {
    let domain = match host {
        Host::Ipv4(ip) => return Ok(vec![SocketAddr::new(IpAddr::V4(ip), port)]),
        Host::Ipv6(ip) => return Ok(vec![SocketAddr::new(IpAddr::V6(ip), port)]),
        Host::Domain(domain) => domain,
    };

    let resolved: std::io::Result<Vec<SocketAddr>> = match &config.resolver {
        Some(resolver) => resolver.resolve(domain).map(|ips| {
            ips.into_iter()
                .map(|ip| SocketAddr::new(ip, port))
                .collect()
        }),
        None => tokio::net::lookup_host((domain, port))
            .await
            .map(|addrs| addrs.collect()),
    };
    resolved.map_err(|source| ConnectError::Resolve {
        host: domain.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{sink, stream};

    fn failing_sink() -> impl Sink<Message, Error = tungstenite::Error> + Send + Unpin + 'static {
        Box::pin(sink::unfold((), |(), _message: Message| async {
            Err::<(), _>(tungstenite::Error::ConnectionClosed)
        }))
    }

    /// Put the connection into `Connecting` under a fresh epoch, as
    /// `connect()` does, without spawning a supervisor.
    fn begin_session(connection: &WebSocketConnection) -> u64 {
        let inner = &connection.inner;
        let mut shared = inner.lock();
        let epoch = inner.advance_epoch(&mut shared);
        inner.set_state(&mut shared, ConnectionState::Connecting);
        epoch
    }

    async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>, wanted: ConnectionEvent) {
        time::timeout(Duration::from_secs(5), async {
            while events.recv().await.unwrap() != wanted {}
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failed_keepalive_write_ends_the_session_like_a_close() {
        let connection = WebSocketConnection::new(TransportConfig::new("http://127.0.0.1:9"));
        let mut events = connection.subscribe();
        let epoch = begin_session(&connection);

        let inner = connection.inner.clone();
        let session =
            tokio::spawn(async move { drive(&inner, epoch, failing_sink(), stream::pending()).await });
        next_event(&mut events, ConnectionEvent::Connected).await;

        let (_, pending) = connection.inner.lock().tracker.register();
        connection.send_keepalive();

        let end = time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(end, SessionEnd::WriteFailed(_)), "{end:?}");

        // Same bookkeeping as a peer close: back-off scheduled, everything
        // pending failed, keepalive gone.
        let delay = connection.inner.session_ended(epoch, end);
        assert_eq!(delay, Some(connection.config().reconnect.delay(1)));
        next_event(&mut events, ConnectionEvent::Disconnected).await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.failure_count(), 1);
        assert_eq!(pending.await, Err(TransportError::ConnectionClosed));
        assert!(connection.inner.lock().keepalive.is_none());
        assert!(!connection.inner.send_keepalive(Some(epoch)));
    }

    #[tokio::test]
    async fn failed_request_write_fails_the_request() {
        let connection = WebSocketConnection::new(TransportConfig::new("http://127.0.0.1:9"));
        let mut events = connection.subscribe();
        let epoch = begin_session(&connection);

        let inner = connection.inner.clone();
        let session =
            tokio::spawn(async move { drive(&inner, epoch, failing_sink(), stream::pending()).await });
        next_event(&mut events, ConnectionEvent::Connected).await;

        let handle = connection
            .send_request(RequestMessage::new("GET", "/v1/ping"))
            .unwrap();
        let end = time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(end, SessionEnd::WriteFailed(_)), "{end:?}");

        connection.inner.session_ended(epoch, end);
        assert_eq!(handle.await, Err(TransportError::ConnectionClosed));
        assert_eq!(connection.pending_requests(), 0);
    }

    #[tokio::test]
    async fn stale_session_end_is_ignored() {
        let connection = WebSocketConnection::new(TransportConfig::new("http://127.0.0.1:9"));
        let epoch = begin_session(&connection);
        let newer = begin_session(&connection);
        assert_ne!(epoch, newer);

        let end = SessionEnd::ClosedByPeer(None);
        assert_eq!(connection.inner.session_ended(epoch, end), None);
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert_eq!(connection.failure_count(), 0);
    }
}

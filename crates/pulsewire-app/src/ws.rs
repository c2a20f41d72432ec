//! WebSocket transport over tokio-tungstenite.
//!
//! Each socket runs in its own task. The task owns the stream, forwards
//! outbound frames from an unbounded queue and reports everything it sees on
//! the runtime's event sink. Connect failures, stalled upgrades and dropped
//! streams are reported as a `Closed` event with code 1006, so the channel
//! treats them like any other abnormal close.
//!
//! Dropping the transport aborts every socket task that was not asked to
//! close. Sockets that were asked to close finish on their own, waiting at
//! most the close timeout for the peer's reply.

use std::{collections::HashMap, time::Duration};

use futures_util::{SinkExt, Stream, StreamExt};
use pulsewire_core::{ChannelEvent, ConnectionId};
use pulsewire_proto::CloseCode;
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::CloseFrame,
    },
};

use crate::transport::{EventSink, OpenRequest, Transport, TransportError};

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS: CloseCode = CloseCode::new(1005);

/// Default bound on the TCP, TLS and upgrade handshakes together.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait for the peer's reply to a close frame we sent.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

enum Outbound {
    Text(String),
    Close(CloseCode),
}

struct SocketHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: AbortHandle,
    closing: bool,
}

/// Production transport.
///
/// Requires a tokio runtime and, for `wss` endpoints, an installed rustls
/// crypto provider.
pub struct WsTransport {
    sockets: HashMap<ConnectionId, SocketHandle>,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self {
            sockets: HashMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl WsTransport {
    /// Create a transport with no sockets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the time from `open` to `Opened`.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound the wait for the peer's close reply.
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    fn socket(&mut self, connection: ConnectionId) -> Result<&mut SocketHandle, TransportError> {
        let socket = self
            .sockets
            .get_mut(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        if socket.outbound.is_closed() {
            return Err(TransportError::Closed(connection));
        }
        Ok(socket)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (connection, socket) in self.sockets.drain() {
            if !socket.closing && !socket.task.is_finished() {
                tracing::debug!(%connection, "aborting websocket task");
                socket.task.abort();
            }
        }
    }
}

impl Transport for WsTransport {
    fn check(&self, request: &OpenRequest) -> Result<(), TransportError> {
        build_request(request).map(drop)
    }

    fn open(&mut self, request: OpenRequest, events: EventSink) -> Result<(), TransportError> {
        self.sockets.retain(|_, socket| !socket.outbound.is_closed());

        let connection = request.connection;
        let upgrade = build_request(&request)?;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let timeouts = (self.connect_timeout, self.close_timeout);

        tracing::debug!(%connection, url = %request.url, "opening websocket");
        let task = tokio::spawn(run_socket(connection, upgrade, timeouts, outbound_rx, events))
            .abort_handle();
        self.sockets.insert(connection, SocketHandle { outbound, task, closing: false });
        Ok(())
    }

    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), TransportError> {
        self.socket(connection)?
            .outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed(connection))
    }

    fn close(&mut self, connection: ConnectionId, code: CloseCode) -> Result<(), TransportError> {
        let socket = self.socket(connection)?;
        socket
            .outbound
            .send(Outbound::Close(code))
            .map_err(|_| TransportError::Closed(connection))?;
        socket.closing = true;
        Ok(())
    }
}

fn build_request(request: &OpenRequest) -> Result<Request, TransportError> {
    let mut upgrade = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

    if let Some(credential) = &request.credential {
        let value = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| TransportError::InvalidRequest(format!("credential: {e}")))?;
        upgrade.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(upgrade)
}

async fn run_socket(
    connection: ConnectionId,
    request: Request,
    (connect_timeout, close_timeout): (Duration, Duration),
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: EventSink,
) {
    let emit = |event: ChannelEvent| {
        // Err means the runtime is gone and nobody cares anymore
        let _ = events.send(event);
    };
    let abnormal = || ChannelEvent::Closed {
        connection,
        code: CloseCode::ABNORMAL,
        reason: String::new(),
    };

    let stream = match tokio::time::timeout(connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            tracing::warn!(%connection, %err, "websocket connect failed");
            emit(ChannelEvent::TransportError { connection, reason: err.to_string() });
            emit(abnormal());
            return;
        },
        Err(_) => {
            tracing::warn!(%connection, ?connect_timeout, "websocket connect timed out");
            let reason = format!("no upgrade within {connect_timeout:?}");
            emit(ChannelEvent::TransportError { connection, reason });
            emit(abnormal());
            return;
        },
    };

    emit(ChannelEvent::Opened { connection });
    let (mut write, mut read) = stream.split();

    let mut outbound_open = true;
    let mut close: Option<(CloseCode, String)> = None;
    let mut awaiting_reply = false;

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    emit(ChannelEvent::FrameReceived { connection, text });
                },
                Some(Ok(Message::Close(frame))) => {
                    let received = frame.map_or((NO_STATUS, String::new()), |f| {
                        (CloseCode::new(u16::from(f.code)), f.reason.as_str().to_owned())
                    });
                    emit(ChannelEvent::Closing { connection });
                    close = Some(received);
                },
                // Control frames are answered by tungstenite; binary is not part of the protocol
                Some(Ok(_)) => {},
                Some(Err(err)) => {
                    emit(ChannelEvent::TransportError { connection, reason: err.to_string() });
                    break;
                },
                None => break,
            },
            command = outbound.recv(), if outbound_open => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = write.send(Message::text(text)).await {
                        emit(ChannelEvent::TransportError { connection, reason: err.to_string() });
                        break;
                    }
                },
                Some(Outbound::Close(code)) => {
                    let frame =
                        CloseFrame { code: code.as_u16().into(), reason: String::new().into() };
                    if let Err(err) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(%connection, %err, "close frame not sent");
                        break;
                    }
                    awaiting_reply = close.is_none();
                    close.get_or_insert((code, String::new()));
                    break;
                },
                None => outbound_open = false,
            },
        }
    }

    if awaiting_reply
        && tokio::time::timeout(close_timeout, await_close_reply(&mut read)).await.is_err()
    {
        tracing::debug!(%connection, ?close_timeout, "peer never answered close");
    }

    let (code, reason) = close.unwrap_or((CloseCode::ABNORMAL, String::new()));
    tracing::debug!(%connection, %code, "websocket finished");
    emit(ChannelEvent::Closed { connection, code, reason });
}

/// Read until the peer's close frame or the end of the stream.
async fn await_close_reply<S>(read: &mut S)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = read.next().await {
        if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future;

    use pulsewire_core::{ChannelConfig, endpoint};
    use tokio::{net::TcpListener, sync::oneshot, time::timeout};
    use tokio_tungstenite::accept_async;
    use url::Url;

    use super::*;
    use crate::{GenerationCache, Runtime, RuntimeError, SystemEnv};

    const WAIT: Duration = Duration::from_secs(5);

    async fn listen() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/ws", listener.local_addr().unwrap())).unwrap();
        (listener, url)
    }

    /// Accept one client, close it with `frame` and drain until it goes away.
    async fn closing_server(frame: Option<CloseFrame>) -> Url {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(tcp).await.unwrap();
            socket.send(Message::Close(frame)).await.unwrap();
            while socket.next().await.is_some() {}
        });
        url
    }

    fn open(transport: &mut WsTransport, url: Url) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let (events, rx) = mpsc::unbounded_channel();
        let request = OpenRequest { connection: ConnectionId::new(1), url, credential: None };
        transport.open(request, events).unwrap();
        rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> Option<ChannelEvent> {
        timeout(WAIT, rx.recv()).await.unwrap()
    }

    async fn events_until_closed(
        rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await.unwrap();
            let done = matches!(event, ChannelEvent::Closed { .. });
            events.push(event);
            if done {
                return events;
            }
        }
    }

    fn request(credential: Option<&str>) -> OpenRequest {
        OpenRequest {
            connection: ConnectionId::new(1),
            url: endpoint::derive("https://app.example.com", "/ws").unwrap(),
            credential: credential.map(str::to_owned),
        }
    }

    #[test]
    fn credential_travels_as_bearer_header() {
        let upgrade = build_request(&request(Some("s3cret"))).unwrap();
        assert_eq!(upgrade.uri().to_string(), "wss://app.example.com/ws");
        assert_eq!(upgrade.headers().get(AUTHORIZATION).unwrap(), "Bearer s3cret");
    }

    #[test]
    fn no_credential_no_header() {
        let upgrade = build_request(&request(None)).unwrap();
        assert!(upgrade.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn credential_with_newline_is_rejected() {
        let result = build_request(&request(Some("bad\nvalue")));
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }

    #[test]
    fn setup_check_rejects_unusable_credential() {
        let transport = WsTransport::new();
        let config = ChannelConfig::new("https://app.example.com").with_credential("bad\nvalue");

        let result = Runtime::<_, GenerationCache, SystemEnv>::check_config(&config, &transport);
        assert!(matches!(result, Err(RuntimeError::Transport(TransportError::InvalidRequest(_)))));
    }

    #[test]
    fn operations_on_unknown_socket_fail() {
        let mut transport = WsTransport::new();
        let missing = ConnectionId::new(9);

        assert!(matches!(
            transport.send(missing, "{}".to_string()),
            Err(TransportError::UnknownConnection(id)) if id == missing
        ));
        assert!(matches!(
            transport.close(missing, CloseCode::NORMAL),
            Err(TransportError::UnknownConnection(_))
        ));
    }

    #[tokio::test]
    async fn close_frame_without_status_reports_1005() {
        let mut transport = WsTransport::new();
        let mut rx = open(&mut transport, closing_server(None).await);
        let id = ConnectionId::new(1);

        assert_eq!(
            events_until_closed(&mut rx).await,
            vec![
                ChannelEvent::Opened { connection: id },
                ChannelEvent::Closing { connection: id },
                ChannelEvent::Closed { connection: id, code: NO_STATUS, reason: String::new() },
            ]
        );
    }

    #[tokio::test]
    async fn server_close_code_and_reason_are_forwarded() {
        let frame = CloseFrame { code: 4001.into(), reason: "rotated".to_string().into() };
        let mut transport = WsTransport::new();
        let mut rx = open(&mut transport, closing_server(Some(frame)).await);

        let events = events_until_closed(&mut rx).await;
        assert_eq!(
            events.last(),
            Some(&ChannelEvent::Closed {
                connection: ConnectionId::new(1),
                code: CloseCode::new(4001),
                reason: "rotated".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn stalled_upgrade_is_an_abnormal_close() {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            future::pending::<()>().await;
        });

        let mut transport = WsTransport::new().with_connect_timeout(Duration::from_millis(100));
        let mut rx = open(&mut transport, url);

        let events = events_until_closed(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ChannelEvent::TransportError { .. }));
        assert_eq!(
            events[1],
            ChannelEvent::Closed {
                connection: ConnectionId::new(1),
                code: CloseCode::ABNORMAL,
                reason: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn unanswered_close_gives_up_after_timeout() {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let _socket = accept_async(tcp).await.unwrap();
            future::pending::<()>().await;
        });

        let mut transport = WsTransport::new().with_close_timeout(Duration::from_millis(100));
        let mut rx = open(&mut transport, url);
        let id = ConnectionId::new(1);
        assert_eq!(next_event(&mut rx).await, Some(ChannelEvent::Opened { connection: id }));

        transport.close(id, CloseCode::NORMAL).unwrap();

        assert_eq!(
            events_until_closed(&mut rx).await,
            vec![ChannelEvent::Closed {
                connection: id,
                code: CloseCode::NORMAL,
                reason: String::new()
            }]
        );
    }

    #[tokio::test]
    async fn dropping_the_transport_aborts_open_sockets() {
        let (listener, url) = listen().await;
        let (gone_tx, gone_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = socket.next().await {}
            let _ = gone_tx.send(());
        });

        let mut transport = WsTransport::new();
        let mut rx = open(&mut transport, url);
        let id = ConnectionId::new(1);
        assert_eq!(next_event(&mut rx).await, Some(ChannelEvent::Opened { connection: id }));

        drop(transport);

        timeout(WAIT, gone_rx).await.unwrap().unwrap();
        assert_eq!(next_event(&mut rx).await, None);
    }
}

//! TCP listener accepting debugger engines.
//!
//! Each accepted socket must deliver its `<init>` handshake within
//! [`HANDSHAKE_TIMEOUT`]. Engines presenting a foreign idekey are dropped
//! silently; accepted ones are wrapped in a [`Connection`] and announced
//! with [`ServerEvent::NewConnection`].

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use xdbg_protocol::{InitMessage, MessageParser};

use crate::config::DebuggerConfig;
use crate::connection::Connection;
use crate::error::{ConnectionError, ServerError};
use crate::events::{ConnectionId, ServerEvent};
use crate::wire::read_frame;

/// How long one accept call may block before the stop signal is rechecked.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Time a new socket gets to deliver its init frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// First pause after a failed `accept()`; doubles per consecutive failure.
pub const ACCEPT_RETRY_BASE: Duration = Duration::from_millis(50);

const LISTEN_BACKLOG: u32 = 5;

/// A bound listening socket, ready to [`run`](Self::run).
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: DebuggerConfig,
    events_tx: mpsc::Sender<ServerEvent>,
    cancel: CancellationToken,
    next_id: u64,
}

impl Listener {
    /// Binds `config.host:config.port` with `SO_REUSEADDR`.
    pub async fn bind(
        config: DebuggerConfig,
        events_tx: mpsc::Sender<ServerEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let resolved = tokio::net::lookup_host(&addr)
            .await
            .map_err(|source| ServerError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ServerError::Resolve {
                addr: addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address"),
            })?;

        let listener = listen(resolved).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!(%local_addr, "listening for debugger engines");

        Ok(Self {
            listener,
            local_addr,
            config,
            events_tx,
            cancel,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts engines until the cancel token fires.
    ///
    /// Always ends by emitting [`ServerEvent::ListenerStopped`].
    pub async fn run(mut self) {
        let mut failures: u32 = 0;
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()) => result,
            };

            match accepted {
                Err(_) => continue,
                Ok(Ok((stream, peer))) => {
                    failures = 0;
                    if let Some(connection) = self.handshake(stream, peer).await {
                        let _ = self
                            .events_tx
                            .send(ServerEvent::NewConnection(connection))
                            .await;
                    }
                }
                Ok(Err(e)) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_retry_delay(failures);
                    error!(error = %e, failures, ?delay, "accept failed");
                    let _ = self
                        .events_tx
                        .send(ServerEvent::ListenerError(e.to_string()))
                        .await;
                    // Errors such as EMFILE leave the socket readable, so
                    // accept() would fail again immediately.
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(local_addr = %self.local_addr, "listener stopped");
        let _ = self.events_tx.send(ServerEvent::ListenerStopped).await;
    }

    async fn handshake(&mut self, stream: TcpStream, peer: SocketAddr) -> Option<Connection> {
        debug!(%peer, "engine connected");
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let init = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = read_handshake(&mut reader, &self.config) => result,
        };

        let init = match init {
            Ok(Some(init)) => init,
            Ok(None) => return None,
            Err(e) => {
                warn!(%peer, error = %e, "handshake failed");
                let _ = self
                    .events_tx
                    .send(ServerEvent::ListenerError(format!(
                        "{e} (during connection initialization with {peer})"
                    )))
                    .await;
                return None;
            }
        };

        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        info!(
            connection = %id,
            %peer,
            idekey = %init.idekey,
            fileuri = %init.fileuri,
            "connection accepted"
        );

        Some(Connection::spawn(
            id,
            Some(peer),
            init,
            reader,
            write_half,
            self.config.feature_limits(),
            self.events_tx.clone(),
        ))
    }
}

/// Reads and checks the init frame.
///
/// Returns `None` when the engine's idekey is not ours.
pub async fn read_handshake<R: AsyncRead + Unpin>(
    reader: &mut R,
    config: &DebuggerConfig,
) -> Result<Option<InitMessage>, ConnectionError> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(reader))
        .await
        .map_err(|_| ConnectionError::Timeout)??;
    let init = MessageParser::new().parse_init(&frame)?;

    if !config.accepts_idekey(&init.idekey) {
        info!(idekey = %init.idekey, "ignoring engine with foreign idekey");
        return Ok(None);
    }
    Ok(Some(init))
}

/// Pause before the next `accept()` after `failures` consecutive errors,
/// capped at [`ACCEPT_POLL_INTERVAL`].
pub fn accept_retry_delay(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    ACCEPT_RETRY_BASE
        .saturating_mul(factor)
        .min(ACCEPT_POLL_INTERVAL)
}

fn listen(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::events::{CommandResult, ConnectionEvent};

    fn init_xml(idekey: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="iso-8859-1"?><init xmlns="urn:debugger_protocol_v1" fileuri="file:///srv/index.php" language="PHP" protocol_version="1.0" appid="1" idekey="{idekey}"><engine version="3.3.0"><![CDATA[Xdebug]]></engine></init>"#
        )
    }

    fn frame(xml: &str) -> Vec<u8> {
        format!("{}\0{xml}\0", xml.len()).into_bytes()
    }

    fn loopback_config(idekey: &str) -> DebuggerConfig {
        DebuggerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            idekey: idekey.into(),
            ..DebuggerConfig::default()
        }
    }

    async fn start(
        idekey: &str,
    ) -> (SocketAddr, mpsc::Receiver<ServerEvent>, CancellationToken) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let listener = Listener::bind(loopback_config(idekey), events_tx, cancel.clone())
            .await
            .unwrap();
        let addr = listener.local_addr();
        tokio::spawn(listener.run());
        (addr, events_rx, cancel)
    }

    async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_matching_idekey() {
        let (addr, mut events, cancel) = start("xdbg").await;

        let mut engine = TcpStream::connect(addr).await.unwrap();
        engine.write_all(&frame(&init_xml("xdbg"))).await.unwrap();

        match next_event(&mut events).await {
            ServerEvent::NewConnection(conn) => {
                assert_eq!(conn.id(), ConnectionId(1));
                assert_eq!(conn.init().idekey, "xdbg");
                assert_eq!(conn.init().engine, "Xdebug 3.3.0");
                assert!(conn.is_alive());
            }
            other => panic!("unexpected {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn rejects_foreign_idekey_silently() {
        let (addr, mut events, cancel) = start("xdbg").await;

        let mut foreign = TcpStream::connect(addr).await.unwrap();
        foreign.write_all(&frame(&init_xml("PHPSTORM"))).await.unwrap();

        // The socket is closed without a reply.
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(5), foreign.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);

        let mut ours = TcpStream::connect(addr).await.unwrap();
        ours.write_all(&frame(&init_xml("xdbg"))).await.unwrap();
        match next_event(&mut events).await {
            ServerEvent::NewConnection(conn) => assert_eq!(conn.id(), ConnectionId(1)),
            other => panic!("unexpected {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn empty_idekey_accepts_any() {
        let (addr, mut events, cancel) = start("").await;

        let mut engine = TcpStream::connect(addr).await.unwrap();
        engine.write_all(&frame(&init_xml("whatever"))).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            ServerEvent::NewConnection(_)
        ));
        cancel.cancel();
    }

    #[tokio::test]
    async fn connections_get_sequential_ids() {
        let (addr, mut events, cancel) = start("").await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        a.write_all(&frame(&init_xml("k"))).await.unwrap();
        let first = next_event(&mut events).await;

        let mut b = TcpStream::connect(addr).await.unwrap();
        b.write_all(&frame(&init_xml("k"))).await.unwrap();
        let second = next_event(&mut events).await;

        match (first, second) {
            (ServerEvent::NewConnection(a), ServerEvent::NewConnection(b)) => {
                assert_eq!(a.id(), ConnectionId(1));
                assert_eq!(b.id(), ConnectionId(2));
            }
            other => panic!("unexpected {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn accepted_connection_runs_commands() {
        let (addr, mut events, cancel) = start("").await;

        let mut engine = TcpStream::connect(addr).await.unwrap();
        engine.write_all(&frame(&init_xml("k"))).await.unwrap();
        let conn = match next_event(&mut events).await {
            ServerEvent::NewConnection(conn) => conn,
            other => panic!("unexpected {other:?}"),
        };

        conn.step_into().await.unwrap();
        let mut line = Vec::new();
        loop {
            let byte = engine.read_u8().await.unwrap();
            if byte == 0 {
                break;
            }
            line.push(byte);
        }
        assert_eq!(line, b"step_into -i 1");

        let reply = r#"<response xmlns="urn:debugger_protocol_v1" command="step_into" transaction_id="1" status="break" reason="ok"><xdebug:message xmlns:xdebug="https://xdebug.org/dbgp/xdebug" filename="file:///srv/index.php" lineno="2"></xdebug:message></response>"#;
        engine.write_all(&frame(reply)).await.unwrap();

        match next_event(&mut events).await {
            ServerEvent::Connection(ConnectionEvent::Completed {
                result: CommandResult::Stepped(msg),
                ..
            }) => assert_eq!(msg.lineno, Some(2)),
            other => panic!("unexpected {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancel_stops_listener() {
        let (_addr, mut events, cancel) = start("").await;
        cancel.cancel();
        assert!(matches!(
            next_event(&mut events).await,
            ServerEvent::ListenerStopped
        ));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let config = DebuggerConfig {
            port,
            ..loopback_config("")
        };
        let result = Listener::bind(config, events_tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        tokio::time::pause();
        let (mut client, _engine) = tokio::io::duplex(64);
        let result = read_handshake(&mut client, &DebuggerConfig::default()).await;
        assert!(matches!(result, Err(ConnectionError::Timeout)));
    }

    #[test]
    fn accept_retry_backs_off() {
        assert_eq!(accept_retry_delay(1), Duration::from_millis(50));
        assert_eq!(accept_retry_delay(2), Duration::from_millis(100));
        assert_eq!(accept_retry_delay(4), Duration::from_millis(400));
        assert_eq!(accept_retry_delay(5), Duration::from_millis(800));
        assert_eq!(accept_retry_delay(6), ACCEPT_POLL_INTERVAL);
        assert_eq!(accept_retry_delay(u32::MAX), ACCEPT_POLL_INTERVAL);
        assert!(accept_retry_delay(0) > Duration::ZERO);
    }

    #[tokio::test]
    async fn failed_handshake_is_reported() {
        let (addr, mut events, cancel) = start("xdbg").await;

        let mut broken = TcpStream::connect(addr).await.unwrap();
        let bytes = frame("<response/>");
        broken.write_all(&bytes).await.unwrap();

        match next_event(&mut events).await {
            ServerEvent::ListenerError(message) => {
                assert!(message.contains("during connection initialization"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }

        // The listener keeps accepting afterwards.
        let mut engine = TcpStream::connect(addr).await.unwrap();
        engine.write_all(&frame(&init_xml("xdbg"))).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            ServerEvent::NewConnection(_)
        ));
        cancel.cancel();
    }

    #[tokio::test]
    async fn garbage_handshake_is_an_error() {
        let bytes = frame("<response/>");
        let mut cursor = &bytes[..];
        let result = read_handshake(&mut cursor, &DebuggerConfig::default()).await;
        assert!(matches!(result, Err(ConnectionError::Parse(_))));
    }
}

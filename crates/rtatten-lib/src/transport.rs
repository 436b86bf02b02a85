use crate::error::{SessionError, SessionResult};
use crate::protocol::OutboundMessage;
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use std::thread::JoinHandle;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Socket lifecycle and inbound traffic, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

/// Outbound half of the session socket.
pub trait Transport {
    fn send(&mut self, message: &OutboundMessage) -> SessionResult<()>;
}

enum WorkerCommand {
    Send(String),
    Shutdown,
}

/// Websocket connection serviced by a background thread.
///
/// The thread only shuttles frames; all session state stays with the caller,
/// which reads [`TransportEvent`]s from the receiver returned by `connect`.
pub struct WebSocketTransport {
    command_tx: Sender<WorkerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn connect(url: &str) -> Result<(Self, Receiver<TransportEvent>)> {
        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let worker = SocketWorker {
            url: url.to_string(),
            command_rx,
            event_tx,
        };
        let handle = std::thread::Builder::new()
            .name("rtatten-socket".into())
            .spawn(move || worker.run())
            .with_context(|| format!("spawning socket worker for {url}"))?;
        Ok((
            Self {
                command_tx,
                worker: Some(handle),
            },
            event_rx,
        ))
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Transport for WebSocketTransport {
    fn send(&mut self, message: &OutboundMessage) -> SessionResult<()> {
        let frame = message.encode()?;
        debug!("outbound frame: {frame}");
        self.command_tx
            .send(WorkerCommand::Send(frame))
            .map_err(|_| SessionError::Transport("socket is closed".into()))
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type Socket = WebSocket<MaybeTlsStream<std::net::TcpStream>>;

struct SocketWorker {
    url: String,
    command_rx: Receiver<WorkerCommand>,
    event_tx: Sender<TransportEvent>,
}

impl SocketWorker {
    fn run(self) {
        info!("connecting to {}", self.url);
        let mut socket = match tungstenite::connect(self.url.as_str()) {
            Ok((socket, _response)) => socket,
            Err(err) => {
                self.emit(TransportEvent::Error(format!(
                    "failed to connect to {}: {err}",
                    self.url
                )));
                self.emit(TransportEvent::Closed);
                return;
            }
        };
        let tcp = match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => Some(stream),
            MaybeTlsStream::Rustls(stream) => Some(stream.get_ref()),
            _ => None,
        };
        match tcp.map(|stream| stream.set_read_timeout(Some(POLL_INTERVAL))) {
            Some(Ok(())) => {}
            Some(Err(err)) => warn!("unable to set socket read timeout: {err}"),
            None => warn!("unsupported socket stream; reads will block"),
        }
        self.emit(TransportEvent::Opened);
        if let Err(message) = self.pump(&mut socket) {
            self.emit(TransportEvent::Error(message));
        }
        self.emit(TransportEvent::Closed);
    }

    /// Runs until the socket closes or the owner shuts down.
    fn pump(&self, socket: &mut Socket) -> Result<(), String> {
        loop {
            loop {
                match self.command_rx.try_recv() {
                    Ok(WorkerCommand::Send(frame)) => {
                        socket
                            .send(Message::Text(frame))
                            .map_err(|err| format!("send failed: {err}"))?;
                    }
                    Ok(WorkerCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        return Ok(());
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
            match socket.read() {
                Ok(Message::Text(text)) => self.emit(TransportEvent::Frame(text)),
                Ok(Message::Close(frame)) => debug!("server closed socket: {frame:?}"),
                Ok(_) => {}
                Err(tungstenite::Error::Io(err))
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(())
                }
                Err(err) => return Err(err.to_string()),
            }
        }
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::net::TcpListener;
    use std::thread;

    /// Accepts one connection and holds it open until `release` fires.
    fn stalled_server() -> (String, Sender<()>, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (release_tx, release_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let _ = release_rx.recv();
            drop(stream);
        });
        (format!("127.0.0.1:{port}"), release_tx, handle)
    }

    #[test]
    fn unreachable_server_reports_error_then_close() {
        let (mut transport, events) =
            WebSocketTransport::connect("ws://127.0.0.1:9/wsUser").unwrap();
        let first = events.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(first, TransportEvent::Error(_)));
        assert_eq!(
            events.recv_timeout(Duration::from_secs(10)).unwrap(),
            TransportEvent::Closed
        );
        transport.shutdown();
        let err = transport.send(&OutboundMessage::Stop).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn secure_urls_attempt_a_tls_handshake() {
        let (addr, release, server) = stalled_server();
        let (mut transport, events) =
            WebSocketTransport::connect(&format!("wss://{addr}/wsUser")).unwrap();
        release.send(()).unwrap();
        let first = events.recv_timeout(Duration::from_secs(10)).unwrap();
        let TransportEvent::Error(message) = first else {
            panic!("expected a connection error, got {first:?}");
        };
        assert!(!message.contains("TLS support not compiled in"), "{message}");
        transport.shutdown();
        server.join().unwrap();
    }

    #[test]
    fn sends_queue_while_handshake_is_pending() {
        let (addr, release, server) = stalled_server();
        let (mut transport, events) =
            WebSocketTransport::connect(&format!("ws://{addr}/wsUser")).unwrap();
        for _ in 0..100 {
            transport.send(&OutboundMessage::GetDefaultConfig).unwrap();
        }
        release.send(()).unwrap();
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(10)).unwrap(),
            TransportEvent::Error(_)
        ));
        transport.shutdown();
        server.join().unwrap();
    }
}

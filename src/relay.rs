use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::error::RelayError;
use crate::render;
use crate::session::{Connection, Session};
use crate::store::SessionStore;

/// Sent on every heartbeat so the remote server does not drop us.
pub const KEEPALIVE: &str = "/";

/// Server chatter that is never shown.
const NOISE: &[&str] = &["*Ping!*", "Unknown command."];

const READ_CHUNK: usize = 1024;

/// Longest unterminated run held back waiting for its newline.
const MAX_PENDING: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub remote_addr: String,
    pub idle_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub read_poll: Duration,
    /// Bound on any single outbound write, keep-alives included.
    pub write_timeout: Duration,
    /// Measured from the last chat view. `None` keeps dead sessions until
    /// the process exits.
    pub dead_session_grace: Option<Duration>,
}

/// Non-error ways a relay ends.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    IdleTimeout,
    Disconnected,
}

pub fn spawn(store: SessionStore, session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(run(store, session))
}

async fn run(store: SessionStore, session: Arc<Session>) {
    let settings = store.settings();
    let id = session.short_token().to_string();

    let outcome = relay(settings, &session).await;

    if let Some(connection) = session.detach() {
        connection.close().await;
    }

    match outcome {
        Ok(Exit::Disconnected) => {
            tracing::info!(session = %id, "session disconnected");
            return;
        }
        Ok(Exit::IdleTimeout) => {
            tracing::info!(
                session = %id,
                idle_secs = settings.idle_timeout.as_secs(),
                "session idle, connection closed"
            );
        }
        Err(RelayError::RemoteClosed) => {
            tracing::info!(session = %id, "remote closed the connection");
        }
        Err(err @ RelayError::Connect { .. }) => {
            tracing::warn!(session = %id, error = %err, "could not reach chat server");
        }
        Err(err) => {
            tracing::warn!(session = %id, error = %err, "connection lost");
        }
    }

    let Some(grace) = settings.dead_session_grace else {
        return;
    };

    // A dead session that is still being viewed stays put.
    loop {
        let idle = session.idle_for();
        if idle >= grace {
            break;
        }

        tokio::select! {
            _ = session.shutdown_token().cancelled() => return,
            _ = sleep(grace - idle) => {}
        }
    }

    if store.remove_exact(&session) {
        tracing::info!(session = %id, "dead session evicted");
    }
}

async fn relay(settings: &RelaySettings, session: &Arc<Session>) -> Result<Exit, RelayError> {
    let shutdown = session.shutdown_token();

    let stream = tokio::select! {
        _ = shutdown.cancelled() => return Ok(Exit::Disconnected),
        result = TcpStream::connect(&settings.remote_addr) => {
            result.map_err(|source| RelayError::Connect {
                addr: settings.remote_addr.clone(),
                source,
            })?
        }
    };

    let (reader, writer) = stream.into_split();
    session.attach(Connection::new(writer, settings.write_timeout));

    tracing::info!(
        session = %session.short_token(),
        remote = %settings.remote_addr,
        "connected to chat server"
    );

    tokio::spawn(heartbeat(session.clone(), settings.heartbeat_interval));

    pump(settings, session, reader).await
}

async fn pump(
    settings: &RelaySettings,
    session: &Session,
    mut reader: OwnedReadHalf,
) -> Result<Exit, RelayError> {
    let shutdown = session.shutdown_token();
    let mut lines = LineBuffer::default();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if session.idle_for() > settings.idle_timeout {
            return Ok(Exit::IdleTimeout);
        }

        let read = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Exit::Disconnected),
            read = timeout(settings.read_poll, reader.read(&mut chunk)) => read,
        };

        match read {
            Err(_elapsed) => {}
            Ok(Ok(0)) => {
                if let Some(line) = lines.flush() {
                    deliver(session, &line, &Local::now());
                }
                return Err(RelayError::RemoteClosed);
            }
            Ok(Ok(n)) => {
                let received_at = Local::now();
                for line in lines.feed(&chunk[..n]) {
                    deliver(session, &line, &received_at);
                }
            }
            Ok(Err(err)) => return Err(err.into()),
        }
    }
}

fn deliver(session: &Session, line: &str, received_at: &DateTime<Local>) {
    if NOISE.contains(&line.trim()) {
        return;
    }

    if let Some(entry) = render::render_line(line, received_at) {
        session.push_line(entry);
    }
}

/// Sends a keep-alive right away and then every `every` for as long as the
/// session holds a connection.
async fn heartbeat(session: Arc<Session>, every: Duration) {
    loop {
        let Some(connection) = session.connection() else {
            break;
        };

        if let Err(err) = connection.send_line(KEEPALIVE).await {
            tracing::debug!(session = %session.short_token(), error = %err, "heartbeat stopped");
            break;
        }

        tokio::select! {
            _ = session.shutdown_token().cancelled() => break,
            _ = sleep(every) => {}
        }
    }
}

/// Re-splits arbitrarily chunked socket data into lines.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();

        if let Some(end) = self.pending.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = self.pending.drain(..=end).collect();
            lines.extend(complete[..end].split(|&b| b == b'\n').map(decode));
        }

        if self.pending.len() > MAX_PENDING {
            lines.extend(self.flush());
        }

        lines
    }

    fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let line = decode(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

/// Lossy UTF-8 decode that drops invalid sequences instead of replacing them.
fn decode(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

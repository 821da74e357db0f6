use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use crate::codegen;

/// Rendered entries kept per session.
pub const BUFFER_CAPACITY: usize = 200;

/// Write side of a session's socket. Cloned out of the record so that
/// writers never hold the record guard across an await.
///
/// Every operation is bounded by `write_timeout`, lock wait included, so a
/// remote that stops reading cannot stall a request or a teardown.
#[derive(Clone)]
pub struct Connection {
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    write_timeout: Duration,
}

impl Connection {
    pub fn new(writer: OwnedWriteHalf, write_timeout: Duration) -> Self {
        Self {
            writer: Arc::new(AsyncMutex::new(writer)),
            write_timeout,
        }
    }

    /// Writes `line` followed by CRLF. Fails with `TimedOut` if the frame is
    /// not handed to the socket within the write timeout.
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut frame = String::with_capacity(line.len() + 2);
        frame.push_str(line);
        frame.push_str("\r\n");

        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(frame.as_bytes()).await
        };

        timeout(self.write_timeout, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
    }

    /// Half-closes the socket. If a stalled writer still holds the lock past
    /// the write timeout, the write half is shut down when its last clone drops.
    pub async fn close(&self) {
        let shutdown = async {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        };

        let _ = timeout(self.write_timeout, shutdown).await;
    }
}

struct Shared {
    lines: VecDeque<String>,
    connection: Option<Connection>,
    last_activity: Instant,
}

/// One browser session: the buffered chat lines, the live socket handle (if
/// any) and the activity clock the relay task checks for idle expiry.
pub struct Session {
    token: String,
    shared: Mutex<Shared>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(token: String) -> Self {
        Self {
            token,
            shared: Mutex::new(Shared {
                lines: VecDeque::with_capacity(BUFFER_CAPACITY),
                connection: None,
                last_activity: Instant::now(),
            }),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn short_token(&self) -> &str {
        codegen::short(&self.token)
    }

    // Every critical section leaves `Shared` consistent, so a poisoned guard
    // is still safe to use.
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_line(&self, entry: String) {
        let mut shared = self.shared();
        if shared.lines.len() == BUFFER_CAPACITY {
            shared.lines.pop_front();
        }
        shared.lines.push_back(entry);
    }

    /// Snapshot of the newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<String> {
        let shared = self.shared();
        let skip = shared.lines.len().saturating_sub(limit);
        shared.lines.iter().skip(skip).cloned().collect()
    }

    pub fn line_count(&self) -> usize {
        self.shared().lines.len()
    }

    pub fn touch(&self) {
        self.shared().last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.shared().last_activity.elapsed()
    }

    pub fn connection(&self) -> Option<Connection> {
        self.shared().connection.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared().connection.is_some()
    }

    pub fn attach(&self, connection: Connection) {
        self.shared().connection = Some(connection);
    }

    pub fn detach(&self) -> Option<Connection> {
        self.shared().connection.take()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Explicit teardown: stops the relay task and closes the socket.
    pub async fn close(&self) {
        self.shutdown.cancel();

        if let Some(connection) = self.detach() {
            connection.close().await;
        }
    }
}

//! Push channel: one duplex connection feeding the dashboard store
//!
//! Owns at most one WebSocket at a time. Each inbound frame is decoded and
//! dispatched to the store before the next is read, so frame handlers never
//! interleave. The channel does not reconnect on its own; on close it goes
//! back to `Disconnected` and reconnection is the caller's policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::push::events::decode_frame;
use crate::store::DashboardStore;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("invalid push endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
enum ChannelCommand {
    Disconnect,
}

struct Session {
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    /// Set by `disconnect()` before the close command is sent; the frame
    /// loop checks it before dispatching, so no frame reaches the store
    /// after `disconnect()` returns.
    closed: Arc<AtomicBool>,
}

struct Inner {
    state: ChannelState,
    session: Option<Session>,
}

pub struct PushChannel {
    url: String,
    store: Arc<DashboardStore>,
    shared: Arc<Mutex<Inner>>,
}

fn lock(shared: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PushChannel {
    pub fn new(url: impl Into<String>, store: Arc<DashboardStore>) -> Self {
        Self {
            url: url.into(),
            store,
            shared: Arc::new(Mutex::new(Inner {
                state: ChannelState::Disconnected,
                session: None,
            })),
        }
    }

    pub fn state(&self) -> ChannelState {
        lock(&self.shared).state
    }

    /// Open the connection in the background. A no-op while a connection
    /// is already open or being opened.
    pub fn connect(&self) -> Result<(), PushError> {
        Url::parse(&self.url)?;

        let mut inner = lock(&self.shared);
        if inner.state != ChannelState::Disconnected {
            debug!(state = ?inner.state, "connect() ignored, channel already active");
            return Ok(());
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        inner.state = ChannelState::Connecting;
        inner.session = Some(Session {
            command_tx,
            closed: closed.clone(),
        });
        drop(inner);

        let url = self.url.clone();
        let store = self.store.clone();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            run_session(url, store, shared, command_rx, closed).await;
        });

        Ok(())
    }

    /// Close the connection. Frames received after this returns are dropped
    /// without being dispatched; a handler already running for an earlier
    /// frame is allowed to complete.
    pub fn disconnect(&self) {
        let inner = lock(&self.shared);
        match &inner.session {
            Some(session) => {
                session.closed.store(true, Ordering::SeqCst);
                let _ = session.command_tx.send(ChannelCommand::Disconnect);
            }
            None => debug!("disconnect() with no active connection"),
        }
    }
}

async fn run_session(
    url: String,
    store: Arc<DashboardStore>,
    shared: Arc<Mutex<Inner>>,
    mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    closed: Arc<AtomicBool>,
) {
    info!(url = %url, "Connecting push channel");

    let ws = match connect_async(url.as_str()).await {
        Ok((ws, response)) => {
            debug!(status = ?response.status(), "Push channel connected");
            ws
        }
        Err(e) => {
            warn!(error = %e, "Push channel connect failed");
            store.push_log(format!("push channel connect failed: {}", e));
            finish(&shared);
            return;
        }
    };

    if closed.load(Ordering::SeqCst) {
        debug!("Disconnected while connecting");
        finish(&shared);
        return;
    }
    lock(&shared).state = ChannelState::Connected;

    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if closed.load(Ordering::SeqCst) {
                            debug!("Dropping frame received after disconnect");
                            break;
                        }
                        let event = decode_frame(&text);
                        store.apply_push(event);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Push channel closed by server");
                        if !closed.load(Ordering::SeqCst) {
                            store.push_log("push channel closed by server");
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel transport error");
                        if !closed.load(Ordering::SeqCst) {
                            store.push_log(format!("push channel error: {}", e));
                        }
                        break;
                    }
                    None => {
                        warn!("Push channel stream ended");
                        if !closed.load(Ordering::SeqCst) {
                            store.push_log("push channel stream ended");
                        }
                        break;
                    }
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    finish(&shared);
    info!("Push channel disconnected");
}

fn finish(shared: &Mutex<Inner>) {
    let mut inner = lock(shared);
    inner.state = ChannelState::Disconnected;
    inner.session = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_channel_is_disconnected() {
        let store = Arc::new(DashboardStore::new());
        let channel = PushChannel::new("ws://localhost:9", store);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn test_disconnect_without_connection_is_noop() {
        let store = Arc::new(DashboardStore::new());
        let channel = PushChannel::new("ws://localhost:9", store.clone());
        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(store.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let store = Arc::new(DashboardStore::new());
        let channel = PushChannel::new("not a url", store);
        assert!(matches!(channel.connect(), Err(PushError::Url(_))));
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }
}

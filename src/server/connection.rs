//! Per-socket WebSocket session
//!
//! Upgrades the socket, registers with the hub, then runs one loop that reads
//! inbound frames, drains the connection's outbox and sends keep-alive pings.
//! The hub is told about the close on every exit path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Message as WsMessage, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::hub::ChatHub;
use crate::message::MessageStore;
use crate::registry::{ConnectionId, Outbox};
use crate::server::config::ServerConfig;

/// Why the session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    Unregistered,
    IdleTimeout,
}

pub(crate) struct WsConnection<S: MessageStore> {
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<ChatHub<S>>,
}

impl<S: MessageStore> WsConnection<S> {
    pub(crate) fn new(
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<ChatHub<S>>,
    ) -> Self {
        Self {
            socket,
            peer_addr,
            config,
            hub,
        }
    }

    /// Run the session to completion
    pub(crate) async fn run(self) -> Result<()> {
        let ws_config = WebSocketConfig::default()
            .max_frame_size(Some(self.config.max_frame_size))
            .max_message_size(Some(self.config.max_frame_size));

        let expected_path = self.config.ws_path.clone();
        let peer_addr = self.peer_addr;
        let check_path = move |request: &Request, response: Response| {
            match check_upgrade_path(expected_path.as_deref(), request) {
                Ok(()) => Ok(response),
                Err(rejection) => {
                    tracing::debug!(
                        peer = %peer_addr,
                        path = request.uri().path(),
                        "Upgrade rejected: wrong path"
                    );
                    Err(rejection)
                }
            }
        };

        let ws = tokio::time::timeout(
            self.config.handshake_timeout,
            tokio_tungstenite::accept_hdr_async_with_config(
                self.socket,
                check_path,
                Some(ws_config),
            ),
        )
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

        let (connection, outbox) = self.hub.on_connection_opened(Some(self.peer_addr)).await;
        let id = connection.id();
        if !connection.is_open() {
            // Refused by the registry; nothing to unregister
            return Ok(());
        }

        let result = pump(id, ws, outbox, &self.config, &self.hub).await;

        self.hub.on_connection_closed(id).await;

        let exit = result?;
        tracing::debug!(connection_id = id, exit = ?exit, "Session ended");
        Ok(())
    }
}

async fn pump<S: MessageStore>(
    id: ConnectionId,
    ws: WebSocketStream<TcpStream>,
    mut outbox: Outbox,
    config: &ServerConfig,
    hub: &ChatHub<S>,
) -> Result<Exit> {
    let (mut sink, mut stream) = ws.split();
    let mut ping = keepalive(config.ping_interval);
    let mut last_seen = Instant::now();

    let exit = loop {
        tokio::select! {
            inbound = stream.next() => {
                let frame = match inbound {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => return Err(e.into()),
                    None => break Exit::ClientClosed,
                };
                last_seen = Instant::now();

                match frame {
                    WsMessage::Text(text) => {
                        hub.on_frame_received(id, text.as_str()).await;
                    }
                    WsMessage::Binary(data) => {
                        hub.on_binary_received(id, &data).await;
                    }
                    WsMessage::Close(_) => break Exit::ClientClosed,
                    // Pings are answered by tungstenite
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                }
            }

            pushed = outbox.recv() => {
                let Some(frame) = pushed else {
                    break Exit::Unregistered;
                };
                match Utf8Bytes::try_from(frame.into_payload()) {
                    Ok(text) => sink.send(WsMessage::Text(text)).await?,
                    Err(e) => {
                        tracing::warn!(connection_id = id, error = %e, "Dropping non-UTF-8 push frame");
                    }
                }
            }

            _ = tick(&mut ping) => {
                sink.send(WsMessage::Ping(Bytes::new())).await?;
            }

            _ = idle_deadline(config.idle_timeout, last_seen) => {
                tracing::info!(connection_id = id, "Idle timeout");
                break Exit::IdleTimeout;
            }
        }
    };

    if exit != Exit::ClientClosed {
        // Best effort; the peer may already be gone
        let _ = sink.send(WsMessage::Close(None)).await;
    }
    let _ = sink.close().await;

    Ok(exit)
}

/// Reject an upgrade request whose path is not `expected` with a 404
fn check_upgrade_path(expected: Option<&str>, request: &Request) -> std::result::Result<(), ErrorResponse> {
    match expected {
        Some(path) if request.uri().path() != path => {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
        _ => Ok(()),
    }
}

fn keepalive(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle_deadline(timeout: Duration, last_seen: Instant) {
    if timeout.is_zero() {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep_until(last_seen + timeout).await;
    }
}

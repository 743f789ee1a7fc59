//! WebSocket link to the vehicle backend.
//!
//! A single background task owns the socket: it connects, installs the
//! outbound queue into the session, pumps frames in both directions and, when
//! the socket drops, tells the session and dials again with truncated
//! exponential backoff. The session state machine only ever sees clean
//! connected/disconnected edges.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

use shared::protocol::OperatorCommand;

use crate::{ConsoleSession, OUTBOUND_QUEUE_DEPTH};

#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// Rewrites the backend's HTTP(S) base URL into its websocket endpoint.
pub fn socket_endpoint(server_url: &str) -> Result<Url> {
    let base = server_url.trim_end_matches('/');
    let ws_base = if base.starts_with("https://") {
        base.replacen("https://", "wss://", 1)
    } else if base.starts_with("http://") {
        base.replacen("http://", "ws://", 1)
    } else {
        return Err(anyhow!("server url must start with http:// or https://"));
    };
    Url::parse(&format!("{ws_base}/ws"))
        .with_context(|| format!("invalid backend server url: {server_url}"))
}

/// Spawns the socket maintenance task. Runs until aborted; every established
/// socket drives the session through `on_transport_connected` /
/// `on_transport_disconnected`.
pub fn spawn(
    session: Arc<ConsoleSession>,
    endpoint: Url,
    policy: ReconnectPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = policy.initial_delay;
        loop {
            match connect_async(endpoint.as_str()).await {
                Ok((socket, _response)) => {
                    info!("websocket connected: {endpoint}");
                    delay = policy.initial_delay;
                    run_socket(&session, socket).await;
                    session.on_transport_disconnected().await;
                    warn!("websocket to {endpoint} closed, reconnecting");
                }
                Err(err) => {
                    warn!("websocket connect to {endpoint} failed: {err}");
                }
            }
            tokio::time::sleep(delay).await;
            delay = policy.next_delay(delay);
        }
    })
}

/// Pumps one established socket until it closes or errors out.
async fn run_socket(
    session: &Arc<ConsoleSession>,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
) {
    let (mut sink, mut source) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OperatorCommand>(OUTBOUND_QUEUE_DEPTH);
    session.on_transport_connected(outbound_tx).await;

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let command = match frame {
                    Some(command) => command,
                    // Queue dropped by the session: the link was detached.
                    None => break,
                };
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("failed to encode outbound frame: {err}");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!("websocket send failed: {err}");
                    break;
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_raw_frame(&text).await,
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary frames are not part of the backend contract.
                    }
                    Some(Err(err)) => {
                        warn!("websocket receive failed: {err}");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_base_becomes_ws_endpoint() {
        let endpoint = socket_endpoint("http://192.168.0.42:5000/").expect("endpoint");
        assert_eq!(endpoint.as_str(), "ws://192.168.0.42:5000/ws");
    }

    #[test]
    fn https_base_becomes_wss_endpoint() {
        let endpoint = socket_endpoint("https://forklift.local").expect("endpoint");
        assert_eq!(endpoint.as_str(), "wss://forklift.local/ws");
    }

    #[test]
    fn bare_host_is_rejected() {
        assert!(socket_endpoint("192.168.0.42:5000").is_err());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        };
        let second = policy.next_delay(policy.initial_delay);
        assert_eq!(second, Duration::from_secs(1));
        let third = policy.next_delay(second);
        assert_eq!(third, Duration::from_secs(2));
        assert_eq!(policy.next_delay(third), Duration::from_secs(2));
    }
}

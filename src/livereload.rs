//! Live-reload notification channel
//!
//! A WebSocket server speaking the LiveReload protocol (version 7). Browser
//! clients connect, exchange `hello`, then receive a `reload` command for
//! every rebuilt path.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::error::{FrontpipeError, Result};

pub const PROTOCOL_7: &str = "http://livereload.com/protocols/official-7";
const SERVER_NAME: &str = "frontpipe";

/// Protocol commands, tagged by `command`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Hello {
        #[serde(default)]
        protocols: Vec<String>,
        #[serde(
            rename = "serverName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        server_name: Option<String>,
    },
    Reload {
        path: String,
        #[serde(rename = "liveCSS")]
        live_css: bool,
    },
    Info {
        #[serde(default)]
        url: Option<String>,
    },
}

/// Handle to a running live-reload server
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<String>,
    addr: SocketAddr,
}

impl LiveReload {
    /// Bind and start accepting clients in the background
    pub async fn start(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| FrontpipeError::LiveReload { source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| FrontpipeError::LiveReload { source })?;

        let (tx, _) = broadcast::channel(64);
        tokio::spawn(accept_loop(listener, tx.clone()));

        info!(%addr, "live-reload server listening");
        Ok(Self { tx, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Tell every greeted client to reload `path`.
    ///
    /// Returns the number of clients that completed the handshake.
    pub fn notify(&self, path: &str) -> usize {
        let command = Command::Reload {
            path: path.to_string(),
            live_css: true,
        };
        match serde_json::to_string(&command) {
            Ok(json) => self.tx.send(json).unwrap_or(0),
            Err(_) => 0,
        }
    }
}

async fn accept_loop(listener: TcpListener, tx: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, tx).await {
                        debug!(%peer, error = %e, "live-reload client dropped");
                    }
                });
            }
            Err(e) => warn!(error = %e, "live-reload accept failed"),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    tx: broadcast::Sender<String>,
) -> std::result::Result<(), tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    // Subscribed once the client has said hello
    let mut rx: Option<broadcast::Receiver<String>> = None;

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(Command::Hello { .. }) = serde_json::from_str::<Command>(&text) {
                        rx = Some(tx.subscribe());
                        let reply = Command::Hello {
                            protocols: vec![PROTOCOL_7.to_string()],
                            server_name: Some(SERVER_NAME.to_string()),
                        };
                        let json = serde_json::to_string(&reply).unwrap_or_default();
                        sink.send(Message::Text(json)).await?;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
            note = next_note(&mut rx) => match note {
                Ok(json) => sink.send(Message::Text(json)).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "live-reload client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

async fn next_note(
    rx: &mut Option<broadcast::Receiver<String>>,
) -> std::result::Result<String, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

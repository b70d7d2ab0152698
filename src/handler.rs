//! WebSocket connection handler
//!
//! Handles individual peer connections: WebSocket handshake, frame
//! parsing, and bidirectional communication with the Registry.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::{AppError, Result};
use crate::message::{ClientMessage, ServerMessage};
use crate::registry::RegistryHandle;
use crate::types::SessionId;

/// How long the writer may keep flushing after the reader has finished
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection settings derived from the relay configuration
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Request path accepted for the WebSocket upgrade
    pub path: Arc<str>,
    /// Outbound mailbox capacity
    pub mailbox_capacity: usize,
}

impl From<&RelayConfig> for ConnectionOptions {
    fn from(config: &RelayConfig) -> Self {
        Self {
            path: Arc::from(config.path.as_str()),
            mailbox_capacity: config.mailbox_capacity,
        }
    }
}

/// Handle a new connection
///
/// Performs the WebSocket handshake, registers the session, and runs the
/// reader and writer until either side ends. Works for plain TCP and TLS
/// streams alike.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: String,
    registry: RegistryHandle,
    options: ConnectionOptions,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // WebSocket handshake, only on the configured path
    let path = options.path.clone();
    let check_path = move |req: &Request,
                           resp: Response|
          -> std::result::Result<Response, ErrorResponse> {
        if req.uri().path() == &*path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("Not Found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let session_id = SessionId::new();
    debug!("Session {} opened for {}", session_id, peer_addr);

    // Server -> client mailbox. The Registry owns the only strong sender;
    // the reader keeps a weak one for answering pings.
    let (mailbox_tx, mut mailbox_rx) = mpsc::channel::<ServerMessage>(options.mailbox_capacity);
    let pong_tx = mailbox_tx.downgrade();

    let username = match registry.register(session_id, mailbox_tx).await {
        Ok(username) => username,
        Err(e) => {
            error!("Failed to register session {}: {}", session_id, e);
            let _ = ws_sender.close().await;
            return Err(e);
        }
    };
    info!(
        "Client {} connected from {} as '{}'",
        session_id, peer_addr, username
    );

    // Spawn read task (WebSocket -> RegistryCommand)
    let reader_registry = registry.clone();
    let reader_name = username.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let msg = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("Invalid JSON from '{}': {}", reader_name, e);
                            continue;
                        }
                    };
                    if dispatch(&reader_registry, session_id, &pong_tx, msg)
                        .await
                        .is_err()
                    {
                        debug!("Registry closed, ending read task for {}", session_id);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client '{}' sent close frame", reader_name);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Protocol pings are answered by tungstenite
                }
                Ok(_) => {
                    // Binary frames - ignore
                }
                Err(e) => {
                    warn!("Read error for '{}': {}", reader_name, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", session_id);
    });

    // Spawn write task (mailbox -> WebSocket)
    let writer_name = username.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = mailbox_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                        warn!("Write error for '{}': {}", writer_name, e);
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for '{}'", writer_name);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", session_id);
            let _ = registry.unregister(session_id).await;
            // Unregistering closes the mailbox; let the writer flush it.
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut write_task).await.is_err() {
                write_task.abort();
            }
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", session_id);
            read_task.abort();
            let _ = registry.unregister(session_id).await;
        }
    }

    info!("Client {} ('{}') disconnected", session_id, username);

    Ok(())
}

/// Route one decoded frame
///
/// Only fails when the Registry is gone.
async fn dispatch(
    registry: &RegistryHandle,
    session_id: SessionId,
    mailbox: &mpsc::WeakSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), AppError> {
    match msg {
        ClientMessage::Message { text } => registry.broadcast(session_id, text).await,
        ClientMessage::RequestUserList => registry.request_user_list(session_id).await,
        ClientMessage::Ping => {
            reply_pong(session_id, mailbox);
            Ok(())
        }
        ClientMessage::Unknown => Ok(()),
    }
}

/// Answer a ping on the session's own mailbox, bypassing the Registry
fn reply_pong(session_id: SessionId, mailbox: &mpsc::WeakSender<ServerMessage>) {
    let Some(mailbox) = mailbox.upgrade() else {
        debug!("Mailbox for {} closed, dropping pong", session_id);
        return;
    };
    if let Err(e) = mailbox.try_send(ServerMessage::Pong) {
        debug!("Pong for {} dropped: {}", session_id, e);
    }
}

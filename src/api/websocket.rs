//! WebSocket handler for voice streams
//!
//! Frames are JSON text: `{"event": "<name>", "data": <payload>}`.
//! Each connection gets its own client ID and session; chunks from one
//! connection are answered in the order they arrive.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiState;
use crate::voice::{AudioChunk, DEFAULT_MIME_TYPE};
use crate::{Error, Result};

/// Incoming WebSocket event from client
///
/// Events without a payload accept a missing, `null` or ignored `data`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WsIncoming {
    /// Open the voice stream
    #[serde(alias = "startVoiceStream")]
    StartStream(Option<IgnoredAny>),
    /// One recorded chunk
    VoiceChunk(VoiceChunkPayload),
    /// Close the voice stream
    #[serde(alias = "endVoiceStream")]
    EndStream(Option<IgnoredAny>),
    /// Keepalive
    Ping(Option<IgnoredAny>),
}

/// Payload of a `voiceChunk` event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChunkPayload {
    /// Base64 audio; optional here so a missing field gets a clear error
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Outgoing WebSocket event to client
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WsOutgoing {
    /// Connection established
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Stream opened
    StreamStarted {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Pipeline result for one chunk
    VoiceResponse { text: String, audio: String },
    /// Stream closed
    StreamEnded {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Error occurred
    Error { message: String },
    /// Pong response
    Pong,
}

impl WsOutgoing {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize into a text frame body
    fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/voice", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    state.manager.connect(&client_id).await;

    // Send connected message
    let connected = WsOutgoing::Connected {
        client_id: client_id.clone(),
    };
    match connected.encode() {
        Ok(msg) => {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                state.manager.disconnect(&client_id).await;
                return;
            }
        }
        Err(e) => tracing::error!(client_id = %client_id, error = %e, "failed to encode event"),
    }

    // Create channel for sending messages back to client
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);

    // Spawn task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match msg.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    let recv_state = Arc::clone(&state);
    let recv_client_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_message(&text, &recv_state, &recv_client_id, &tx).await
                    {
                        tracing::warn!(
                            client_id = %recv_client_id,
                            error = %e,
                            "rejected client message"
                        );
                        if tx.send(WsOutgoing::error(e.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        client_id = %recv_client_id,
                        len = data.len(),
                        "ignoring binary frame"
                    );
                    let _ = tx
                        .send(WsOutgoing::error("expected JSON text frames"))
                        .await;
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %recv_client_id, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.manager.disconnect(&client_id).await;
}

/// Handle a single incoming message
///
/// Pipeline failures are answered with an `error` event here; only
/// malformed frames and a closed channel come back as `Err`.
async fn handle_message(
    text: &str,
    state: &ApiState,
    client_id: &str,
    tx: &mpsc::Sender<WsOutgoing>,
) -> Result<()> {
    let incoming: WsIncoming = serde_json::from_str(text)
        .map_err(|e| Error::Payload(format!("invalid message: {e}")))?;

    match incoming {
        WsIncoming::Ping(_) => send(tx, WsOutgoing::Pong).await,
        WsIncoming::StartStream(_) => {
            state.manager.start_stream(client_id).await;
            send(
                tx,
                WsOutgoing::StreamStarted {
                    client_id: client_id.to_string(),
                },
            )
            .await
        }
        WsIncoming::VoiceChunk(payload) => {
            let chunk = decode_chunk(payload)?;
            let reply = match state.manager.handle_chunk(client_id, chunk).await {
                Ok(result) => WsOutgoing::VoiceResponse {
                    text: result.text,
                    audio: STANDARD.encode(&result.audio),
                },
                Err(e) => WsOutgoing::error(format!("Error processing voice chunk: {e}")),
            };
            send(tx, reply).await
        }
        WsIncoming::EndStream(_) => {
            state.manager.end_stream(client_id).await;
            send(
                tx,
                WsOutgoing::StreamEnded {
                    client_id: client_id.to_string(),
                },
            )
            .await
        }
    }
}

/// Turn a wire payload into an [`AudioChunk`]
///
/// # Errors
///
/// Returns [`Error::Payload`] if `audio` is missing or not valid Base64
pub fn decode_chunk(payload: VoiceChunkPayload) -> Result<AudioChunk> {
    let audio = payload
        .audio
        .ok_or_else(|| Error::Payload("voiceChunk is missing the audio field".to_string()))?;

    // Accept data URLs as produced by FileReader.readAsDataURL
    let encoded = audio
        .split_once(";base64,")
        .map_or(audio.as_str(), |(_, data)| data);

    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Payload(format!("audio is not valid base64: {e}")))?;

    let mime_type = payload
        .mime_type
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

    Ok(AudioChunk::new(data, mime_type))
}

async fn send(tx: &mpsc::Sender<WsOutgoing>, msg: WsOutgoing) -> Result<()> {
    tx.send(msg).await.map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "websocket channel closed",
        ))
    })
}

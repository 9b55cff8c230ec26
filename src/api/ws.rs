//! WebSocket endpoint streaming change events to subscribed clients

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamMap;
use tracing::{debug, info, warn};

use crate::api::state::AppState;
use crate::api::types::Json;
use crate::domain::events::{ChangeEvent, POI_CHANNEL};
use crate::domain::poi::{Poi, PoiId};

/// Silence after which the server pings the client
pub const IDLE_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Messages accepted from clients
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default = "default_channel")]
        channel: String,
    },
    Unsubscribe {
        #[serde(default = "default_channel")]
        channel: String,
    },
    Ping,
}

fn default_channel() -> String {
    POI_CHANNEL.to_string()
}

/// Messages sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Subscribed {
        channel: String,
        timestamp: DateTime<Utc>,
    },
    Unsubscribed {
        channel: String,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Ping {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
    PoiCreated(EventPayload),
    PoiUpdated(EventPayload),
    PoiDeleted(EventPayload),
}

/// Body of a forwarded change event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub poi_id: PoiId,
    pub data: Option<Poi>,
    pub timestamp: DateTime<Utc>,
}

impl From<ChangeEvent> for ServerMessage {
    fn from(event: ChangeEvent) -> Self {
        use crate::domain::events::ChangeKind;

        let payload = EventPayload {
            poi_id: event.poi_id,
            data: event.poi,
            timestamp: event.timestamp,
        };

        match event.kind {
            ChangeKind::Created => ServerMessage::PoiCreated(payload),
            ChangeKind::Updated => ServerMessage::PoiUpdated(payload),
            ChangeKind::Deleted => ServerMessage::PoiDeleted(payload),
        }
    }
}

/// Decodes a text frame; unknown or malformed messages become an error reply
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ServerMessage> {
    serde_json::from_str(text).map_err(|_| {
        let kind = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.get("type").cloned());

        let message = match kind {
            Some(serde_json::Value::String(kind)) => format!("Unknown message type: {}", kind),
            _ => "Invalid message".to_string(),
        };

        ServerMessage::Error {
            message,
            timestamp: Utc::now(),
        }
    })
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let _guard = state.track_ws_connection();
    info!(connections = state.ws_connections(), "WebSocket connected");

    let welcome = ServerMessage::Connected {
        message: "Connected to GeoSearch WebSocket".to_string(),
        timestamp: Utc::now(),
    };
    if send(&mut socket, &welcome).await.is_err() {
        return;
    }

    // Dropping a stream drops its receiver, which unsubscribes it
    let mut subscriptions: StreamMap<String, BroadcastStream<ChangeEvent>> = StreamMap::new();

    loop {
        tokio::select! {
            incoming = tokio::time::timeout(IDLE_PING_INTERVAL, socket.recv()) => {
                let frame = match incoming {
                    Ok(Some(Ok(frame))) => frame,
                    Ok(Some(Err(e))) => {
                        debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        let ping = ServerMessage::Ping { timestamp: Utc::now() };
                        if send(&mut socket, &ping).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let reply = match frame {
                    Message::Text(text) => match parse_client_message(text.as_str()) {
                        Ok(message) => handle_client_message(message, &state, &mut subscriptions),
                        Err(error) => error,
                    },
                    Message::Close(_) => break,
                    _ => continue,
                };

                if send(&mut socket, &reply).await.is_err() {
                    break;
                }
            }
            Some((channel, item)) = subscriptions.next(), if !subscriptions.is_empty() => {
                match item {
                    Ok(event) => {
                        if send(&mut socket, &ServerMessage::from(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "WebSocket subscriber lagged, events dropped");
                    }
                }
            }
        }
    }

    info!(connections = state.ws_connections().saturating_sub(1), "WebSocket disconnected");
}

fn handle_client_message(
    message: ClientMessage,
    state: &AppState,
    subscriptions: &mut StreamMap<String, BroadcastStream<ChangeEvent>>,
) -> ServerMessage {
    let timestamp = Utc::now();

    match message {
        ClientMessage::Subscribe { channel } => {
            if !subscriptions.contains_key(&channel) {
                let receiver = state.notifier.subscribe(&channel);
                subscriptions.insert(channel.clone(), BroadcastStream::new(receiver));
                debug!(channel = %channel, "WebSocket subscribed");
            }
            ServerMessage::Subscribed { channel, timestamp }
        }
        ClientMessage::Unsubscribe { channel } => {
            subscriptions.remove(&channel);
            debug!(channel = %channel, "WebSocket unsubscribed");
            ServerMessage::Unsubscribed { channel, timestamp }
        }
        ClientMessage::Ping => ServerMessage::Pong { timestamp },
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}

/// WebSocket statistics
#[derive(Debug, Serialize)]
pub struct WsStatsResponse {
    pub total_connections: usize,
    pub channels: BTreeMap<String, usize>,
}

/// GET /ws/stats
pub async fn ws_stats(State(state): State<AppState>) -> Json<WsStatsResponse> {
    Json(WsStatsResponse {
        total_connections: state.ws_connections(),
        channels: state.notifier.subscriber_counts().into_iter().collect(),
    })
}

// crates/server/src/ws.rs
//! The push channel: one WebSocket per browser session.
//!
//! Protocol: the client's first message must be `register-user`; the server
//! acks with `user-registered`, hydrates the session with all three current
//! collections, then streams `device-update` / `user-update` /
//! `connection-update` events until the socket closes. Closing the socket
//! detaches the session, which may trigger the registry's global reset.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broadcast::StateEvent;
use crate::state::AppState;

/// Client-to-server messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientMessage {
    RegisterUser {
        id: Option<String>,
        name: Option<String>,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let (mut sink, mut stream) = socket.split();

    // First message must be register-user
    let Some(Ok(Message::Text(first_msg))) = stream.next().await else {
        return;
    };
    let Ok(ClientMessage::RegisterUser { id, name }) =
        serde_json::from_str::<ClientMessage>(&first_msg)
    else {
        let _ = sink
            .send(Message::Text(
                r#"{"error":"first message must be register-user"}"#.into(),
            ))
            .await;
        return;
    };

    // Register the identity and anchor it to a device entry, all under one
    // registry acquisition.
    let client_ip = addr.ip().to_string();
    let user = state.with_registry(|reg| {
        let user = reg.upsert_user(id, name, Some(client_ip));
        reg.attach_session_device(&user);
        user
    });

    let session_id = format!("session-{}", Uuid::new_v4());
    state.sessions.attach(&session_id, &user.id);
    info!(session_id = %session_id, user_id = %user.id, name = %user.name, "user registered");

    // Subscribe before hydrating so no event published after the snapshot
    // can be missed.
    let mut rx = state.events.subscribe();

    let ack = serde_json::json!({ "type": "user-registered", "payload": user });
    if sink.send(Message::Text(ack.to_string().into())).await.is_err() {
        teardown(&state, &session_id);
        return;
    }
    for event in state.snapshot_events() {
        if send_event(&mut sink, &event).await.is_err() {
            teardown(&state, &session_id);
            return;
        }
    }

    // Everyone else learns about the new user and its device entry.
    state.publish_devices();
    state.publish_users();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // A slow client skipped n events; full snapshots
                        // make catch-up a matter of resending the latest.
                        warn!(session_id = %session_id, skipped = n, "session lagged, rehydrating");
                        for event in state.snapshot_events() {
                            if send_event(&mut sink, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Re-registration and anything else on an open session
                    // is ignored; the push channel is one-way after the
                    // handshake.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    teardown(&state, &session_id);
}

/// Detach the session and rebroadcast every collection.
fn teardown(state: &Arc<AppState>, session_id: &str) {
    let Some(user_id) = state.sessions.detach(session_id) else {
        return;
    };
    let removal = state.with_registry(|reg| reg.remove_user_session(&user_id));
    if removal.reset {
        state.sessions.clear();
        info!("all users disconnected, registry cleared");
    }
    state.publish_all();
    info!(session_id = %session_id, user_id = %user_id, "client disconnected");
}

async fn send_event(
    sink: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    event: &StateEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap_or_default();
    sink.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_user_message_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"register-user","name":"Alice"}"#).unwrap();
        let ClientMessage::RegisterUser { id, name } = msg;
        assert_eq!(id, None);
        assert_eq!(name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let parsed = serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#);
        assert!(parsed.is_err());
    }
}

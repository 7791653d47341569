//! Message Hub (§4.J): the full-duplex client protocol.
//!
//! Each connection gets a read-loop/write-loop task pair. The write-loop owns the
//! socket's send half and drains a bounded per-client queue so a slow client never
//! back-pressures the broadcast fan-out or the command-issuing side of the same
//! connection; on overflow the client is disconnected rather than blocked on.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::api::{resolve_profile, AppState};
use crate::command::Command;
use crate::engine::build_all_values;
use crate::events::{InitialSnapshot, ServerEvent};
use crate::protocol_constants::{CLIENT_QUEUE_DEPTH, CLIENT_WRITE_DEADLINE};

/// Query parameters accepted on the WebSocket upgrade request. A bearer token here is
/// the normal path; IP-whitelist auto-auth (§4.K) is the fallback when absent.
#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// Accepts either a JSON object (`{"1": 255, "5": 128}`) or a parallel array
/// (`[255, 0, 128, ...]` starting at channel 1) for `set_channels`, matching the
/// client protocol's "values (map or array)" wording.
#[derive(Deserialize)]
#[serde(untagged)]
enum ValuesInput {
    Map(HashMap<String, u8>),
    Array(Vec<u8>),
}

impl ValuesInput {
    fn into_pairs(self) -> Vec<(u16, u8)> {
        match self {
            ValuesInput::Map(map) => map
                .into_iter()
                .filter_map(|(k, v)| k.parse::<u16>().ok().map(|channel| (channel, v)))
                .collect(),
            ValuesInput::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| ((i + 1) as u16, v))
                .collect(),
        }
    }
}

/// Client → server command envelopes (§6's client protocol table).
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsIncoming {
    SetChannel { universe_id: u32, channel: u16, value: u8 },
    SetChannels { universe_id: u32, values: ValuesInput },
    SetActiveScene { scene_id: u64 },
    SetGlobalGrandmaster { value: u8 },
    SetUniverseGrandmaster { universe_id: u32, value: u8 },
    GetValues { universe_id: u32 },
    GetInputValues { universe_id: u32 },
    GetAllUniverses,
    GetAllInputValues,
}

/// WebSocket upgrade handler: resolves the caller's profile before accepting the
/// connection so an unauthenticated caller never gets a live socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<WsAuthQuery>,
) -> impl IntoResponse {
    let profile = resolve_profile(&state, addr, query.token);
    ws.on_upgrade(move |socket| handle_ws(socket, state, addr, profile))
}

/// Main connection handler. Runs until the client disconnects, the connection is
/// force-closed (e.g. by a mass `close_all`), or the write queue overflows.
async fn handle_ws(
    socket: WebSocket,
    state: AppState,
    addr: SocketAddr,
    profile: Option<crate::model::profile::AccessProfile>,
) {
    let (mut sink, mut stream) = socket.split();

    let Some(profile) = profile else {
        let _ = sink
            .send(Message::Close(None))
            .await;
        log::warn!("[ws] rejected unauthenticated connection from {addr}");
        return;
    };

    let conn_guard = state.ws_manager.register();
    let client_id_str = conn_guard.id().to_string();
    let client_id: u32 = client_id_str
        .trim_start_matches("ws-")
        .parse()
        .unwrap_or(0);
    let cancel_token = conn_guard.cancel_token().clone();

    log::info!("[ws] {client_id_str} connected from {addr} as profile '{}'", profile.name);

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(CLIENT_QUEUE_DEPTH);

    let write_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            match tokio::time::timeout(CLIENT_WRITE_DEADLINE, sink.send(msg)).await {
                Ok(Ok(())) => {}
                _ => break,
            }
        }
    });

    let initial = ServerEvent::Connected {
        client_id: client_id_str.clone(),
        initial_snapshot: InitialSnapshot {
            universes: build_all_values(&state.store),
            active_scene_id: state.engine_status.load().active_scene_id,
            global_grandmaster: state.engine_status.load().global_grandmaster,
        },
    };
    if !try_enqueue(&outbound_tx, &initial) {
        write_task.abort();
        return;
    }

    let mut broadcast_rx = state.event_bridge.subscribe();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[ws] {client_id_str} force-closed");
                break;
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming_text(&state, &profile, client_id, &text, &outbound_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = broadcast_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !try_enqueue(&outbound_tx, &event) {
                            log::warn!("[ws] {client_id_str} outbound queue overflow, disconnecting");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[ws] {client_id_str} lagged, skipped {skipped} broadcast event(s)");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    drop(outbound_tx);
    let _ = write_task.await;
    let _ = state.commands.send(Command::ClientDisconnected { client_id }).await;
    log::info!("[ws] {client_id_str} disconnected");
}

/// Serializes `event` and pushes it onto the client's bounded outbound queue without
/// blocking. Returns `false` on overflow or if the write task has already exited.
fn try_enqueue(outbound_tx: &mpsc::Sender<Message>, event: &ServerEvent) -> bool {
    let Ok(json) = serde_json::to_string(event) else {
        return true;
    };
    outbound_tx.try_send(Message::Text(json.into())).is_ok()
}

async fn handle_incoming_text(
    state: &AppState,
    profile: &crate::model::profile::AccessProfile,
    client_id: u32,
    text: &str,
    outbound_tx: &mpsc::Sender<Message>,
) {
    let parsed: Result<WsIncoming, _> = serde_json::from_str(text);
    let Ok(incoming) = parsed else {
        send_error(outbound_tx, "invalid_request", "unrecognized command envelope");
        return;
    };

    let snapshot = state.snapshot.load_full();

    let command = match incoming {
        WsIncoming::SetChannel { universe_id, channel, value } => {
            if snapshot.universe(universe_id).is_none() {
                send_error(outbound_tx, "universe_not_found", "unknown universe id");
                return;
            }
            Some(Command::SetChannel { universe_id, channel, value, client_id })
        }
        WsIncoming::SetChannels { universe_id, values } => {
            if snapshot.universe(universe_id).is_none() {
                send_error(outbound_tx, "universe_not_found", "unknown universe id");
                return;
            }
            Some(Command::SetChannels { universe_id, values: values.into_pairs(), client_id })
        }
        WsIncoming::SetActiveScene { scene_id } => {
            // Informational only (§6): the client is reporting its own selection, not
            // requesting a recall. Authoritative recall is `POST /api/scenes/{id}/recall`.
            if snapshot.scene(scene_id).is_none() {
                send_error(outbound_tx, "scene_not_found", "unknown scene id");
                return;
            }
            if !profile.allows_scene(scene_id) {
                send_error(outbound_tx, "permission_denied", "scene not allowed for this profile");
                return;
            }
            None
        }
        WsIncoming::SetGlobalGrandmaster { value } => {
            Some(Command::SetGlobalGrandmaster { value, client_id })
        }
        WsIncoming::SetUniverseGrandmaster { universe_id, value } => {
            Some(Command::SetUniverseGrandmaster { universe_id, value, client_id })
        }
        WsIncoming::GetValues { universe_id } => {
            let values = state.store.snapshot(universe_id).map(|s| s.output.to_vec()).unwrap_or_default();
            let event = ServerEvent::Values {
                universe_id,
                values,
                source: ServerEvent::source_string(&crate::model::source_tag::SourceTag::user(client_id)),
            };
            try_enqueue(outbound_tx, &event);
            None
        }
        WsIncoming::GetInputValues { universe_id } => {
            let values = state
                .store
                .snapshot(universe_id)
                .map(|s| s.input_merged.to_vec())
                .unwrap_or_default();
            let event = ServerEvent::InputValues { universe_id, values };
            try_enqueue(outbound_tx, &event);
            None
        }
        WsIncoming::GetAllUniverses => {
            let event = ServerEvent::AllValues { universes: build_all_values(&state.store) };
            try_enqueue(outbound_tx, &event);
            None
        }
        WsIncoming::GetAllInputValues => {
            let universes = state
                .store
                .snapshot_all()
                .into_iter()
                .map(|s| crate::events::UniverseValues { universe_id: s.universe_id, values: s.input_merged.to_vec() })
                .collect();
            let event = ServerEvent::AllValues { universes };
            try_enqueue(outbound_tx, &event);
            None
        }
    };

    if let Some(command) = command {
        if state.commands.send(command).await.is_err() {
            send_error(outbound_tx, "internal_error", "engine is not accepting commands");
        }
    }
}

fn send_error(outbound_tx: &mpsc::Sender<Message>, code: &str, message: &str) {
    let event = ServerEvent::Error { code: code.to_string(), message: message.to_string() };
    try_enqueue(outbound_tx, &event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_input_map_parses_string_keyed_channels() {
        let mut map = HashMap::new();
        map.insert("1".to_string(), 255u8);
        map.insert("5".to_string(), 128u8);
        let mut pairs = ValuesInput::Map(map).into_pairs();
        pairs.sort();
        assert_eq!(pairs, vec![(1, 255), (5, 128)]);
    }

    #[test]
    fn values_input_array_is_one_indexed() {
        let pairs = ValuesInput::Array(vec![10, 20, 30]).into_pairs();
        assert_eq!(pairs, vec![(1, 10), (2, 20), (3, 30)]);
    }
}

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use kaigi_core::PresenceRecord;

use crate::AppState;

/// WebSocket handler for the presence channel.
///
/// Protocol: the client's first text frame is its presence record (the
/// join); every later frame is a re-publication with a refreshed editing
/// location. The server pushes the full roster on every change. Membership
/// ends with the socket, so a silent disconnect prunes the participant.
async fn ws_handler(
    State(state): State<AppState>,
    Path(meeting_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, meeting_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, meeting_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    // the first frame must be the join record
    let record: PresenceRecord = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                Ok(record) => break record,
                Err(err) => {
                    tracing::warn!("Rejecting presence join: {}", err);
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    };
    let participant_id = record.participant_id;
    let membership = state.presence.join(meeting_id, record);

    let mut roster_rx = state.presence.roster(meeting_id);
    let mut send_task = tokio::spawn(async move {
        // current roster first, then every change
        loop {
            let snapshot = roster_rx.borrow_and_update().clone();
            let payload = match serde_json::to_string(&snapshot) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!("Failed to encode roster: {}", err);
                    break;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
            if roster_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let presence = state.presence.clone();
    let mut recv_task = tokio::spawn(async move {
        // membership lives in this task: dropping it on exit is the leave
        let _membership = membership;
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<PresenceRecord>(&text) {
                    Ok(update) if update.participant_id == participant_id => {
                        presence.publish(meeting_id, update);
                    }
                    Ok(_) => {
                        tracing::warn!("Presence update for a foreign participant ignored");
                    }
                    Err(err) => {
                        tracing::warn!("Undecodable presence update: {}", err);
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::debug!(
        "Presence connection closed for meeting {} participant {}",
        meeting_id,
        participant_id
    );
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/presence/{meeting_id}", get(ws_handler))
}

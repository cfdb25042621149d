use crate::http::{AppState, Caller};
use crate::push::PushHub;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_core::UserId;
use tracing::{debug, info};

/// `GET /push`: upgrades to the caller's push stream.
pub async fn push_handler(
    ws: WebSocketUpgrade,
    Caller(user): Caller,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, user.id, hub))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, hub: PushHub) {
    info!("push stream opened for user {}", user_id);

    let (mut sender, mut receiver) = socket.split();
    let (subscription, mut rx) = hub.subscribe(user_id);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // The stream is one-way; inbound frames only keep the socket alive.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => {
                    debug!("ignoring inbound push frame from user {}: {}", user_id, text)
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    hub.unsubscribe(user_id, subscription);
    info!("push stream closed for user {}", user_id);
}

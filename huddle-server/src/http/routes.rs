use crate::error::{Error, Result};
use crate::http::{AppState, Caller};
use crate::push::push_handler;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use huddle_core::UserId;
use serde::Deserialize;
use serde_json::{Value, json};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}", get(show_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/leave", delete(leave_room))
        .route("/rooms/{id}/participants", get(list_participants))
        .route("/rooms/{id}/signal", post(signal))
        .route("/rooms/{id}/kick", delete(kick))
        .route("/ice-servers", get(ice_servers))
        .route("/push", get(push_handler))
        .with_state(state)
}

async fn list_rooms(State(state): State<AppState>, Caller(user): Caller) -> Json<Value> {
    let rooms = state.huddle.visible_rooms(&user).await;
    Json(json!({ "rooms": rooms }))
}

async fn show_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let room = state.huddle.show(&user, &id).await?;
    Ok(Json(json!({ "room": room })))
}

async fn join_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let room = state.huddle.join(&user, &id).await?;
    Ok(Json(json!({ "room": room })))
}

async fn leave_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.huddle.leave(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_participants(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let participants = state.huddle.participants(&user, &id).await?;
    Ok(Json(json!({ "participants": participants })))
}

async fn signal(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<StatusCode> {
    let payload = body
        .get("payload")
        .ok_or_else(|| Error::Validation("missing payload".into()))?;

    state.huddle.signal(&user, &id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct KickParams {
    user_id: u64,
}

async fn kick(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    Query(params): Query<KickParams>,
) -> Result<StatusCode> {
    state.huddle.kick(&user, &id, UserId(params.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ice_servers(State(state): State<AppState>, Caller(_): Caller) -> Json<Value> {
    Json(json!({ "ice_servers": state.huddle.ice_servers() }))
}

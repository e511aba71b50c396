//! Chat REST surface: room creation/listing and message history.
//!
//! Room creation is the one REST flow that reaches into socket state — after
//! the transaction commits, the lifecycle bridge notifies connected members
//! directly (see `bridge`).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat_proto::MessagePayload;
use serde::Deserialize;
use storage::RoomOverview;
use tracing::info;

use crate::auth::AuthUser;
use crate::bridge;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

const MAX_ROOM_NAME_CHARS: usize = 255;
const MAX_HISTORY_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

/// POST /api/chat/rooms
///
/// Transactional create-or-find; 201 with resolved members on create, 200
/// with the existing room when the advisory duplicate check finds one. The
/// bridge fan-out is best-effort and runs only for rooms that were actually
/// created.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Response, ApiError> {
    if let Some(name) = &request.name {
        let length = name.chars().count();
        if length == 0 || length > MAX_ROOM_NAME_CHARS {
            return Err(ApiError::BadRequest(
                "Room name must be 1-255 characters".to_string(),
            ));
        }
    }
    if request.is_group && request.name.is_none() {
        return Err(ApiError::BadRequest("Group rooms require a name".to_string()));
    }

    let (room, created) = state
        .store
        .create_or_find_room(
            user.user_id,
            request.name.clone(),
            request.is_group,
            &request.member_ids,
        )
        .await?;

    if created {
        info!(
            room = room.id,
            created_by = user.user_id,
            is_group = room.is_group,
            "Room created"
        );
        metrics::record_room_created();
        bridge::notify_new_room(&state.registry, &room);
        Ok((StatusCode::CREATED, Json(room)).into_response())
    } else {
        Ok((StatusCode::OK, Json(room)).into_response())
    }
}

/// GET /api/chat/rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<RoomOverview>>, ApiError> {
    Ok(Json(state.store.list_rooms(user.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

/// GET /api/chat/rooms/{room_id}/messages
pub async fn room_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessagePayload>>, ApiError> {
    if !state.store.is_member(room_id, user.user_id).await? {
        return Err(ApiError::Forbidden);
    }

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_HISTORY_PAGE_SIZE);
    Ok(Json(state.store.room_messages(room_id, page, limit).await?))
}

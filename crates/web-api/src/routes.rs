use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    CreateGroupRoomRequest, DeleteMessageRequest, DirectChatRequest, EventStream,
    InviteParticipantRequest, LeaveRoomRequest, MarkReadRequest, MessageDto, RoomDto,
    SendMessageRequest,
};
use domain::MessageType;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
    /// 除创建者之外的初始成员
    participant_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct DirectChatPayload {
    other_id: Uuid,
    counterpart_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvitePayload {
    invitee_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct MarkReadPayload {
    message_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
    message_type: Option<MessageType>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UnreadResponse {
    unread: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/direct", post(open_direct_chat))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/participants", post(invite_participant))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/read", post(mark_read))
        .route("/rooms/{room_id}/unread", get(unread_count))
        .route(
            "/rooms/{room_id}/messages",
            post(send_message).get(get_history),
        )
        .route(
            "/rooms/{room_id}/messages/{message_id}",
            delete(delete_message),
        )
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let rooms = state.chat_service.list_rooms(user_id).await?;
    Ok(Json(rooms))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let creator_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .chat_service
        .create_group_room(CreateGroupRoomRequest {
            name: payload.name,
            creator_id,
            participant_ids: payload.participant_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn open_direct_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DirectChatPayload>,
) -> Result<Json<RoomDto>, ApiError> {
    let requester_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .chat_service
        .find_or_create_direct_chat(DirectChatRequest {
            requester_id,
            other_id: payload.other_id,
            counterpart_name: payload.counterpart_name,
        })
        .await?;

    Ok(Json(dto))
}

async fn get_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state.chat_service.get_room(room_id, user_id).await?;
    Ok(Json(dto))
}

async fn invite_participant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<InvitePayload>,
) -> Result<Json<RoomDto>, ApiError> {
    let inviter_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .chat_service
        .invite_participant(InviteParticipantRequest {
            room_id,
            inviter_id,
            invitee_id: payload.invitee_id,
        })
        .await?;

    Ok(Json(dto))
}

async fn leave_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    state
        .chat_service
        .leave_room(LeaveRoomRequest { room_id, user_id })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<MarkReadPayload>,
) -> Result<StatusCode, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    state
        .chat_service
        .mark_message_read(MarkReadRequest {
            room_id,
            user_id,
            message_id: payload.message_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<Json<UnreadResponse>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let unread = state.chat_service.unread_count(room_id, user_id).await?;
    Ok(Json(UnreadResponse { unread }))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Json<MessageDto>, ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .chat_service
        .send_message(SendMessageRequest {
            room_id,
            sender_id,
            content: payload.content,
            message_type: payload.message_type.unwrap_or(MessageType::Text),
            image_url: payload.image_url,
        })
        .await?;

    Ok(Json(dto))
}

async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let limit = query.limit.unwrap_or(50).min(100);
    let items = state
        .chat_service
        .recent_messages(room_id, user_id, limit)
        .await?;

    Ok(Json(items))
}

async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let requester_id = state.jwt_service.extract_user_from_headers(&headers)?;
    state
        .chat_service
        .delete_message(DeleteMessageRequest {
            room_id,
            message_id,
            requester_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

/// WebSocket 升级。token 放在查询串里，浏览器 WebSocket API 无法
/// 设置 Authorization 头。升级前完成认证，无效 token 直接 401。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let claims = state.jwt_service.verify_token(&query.token)?;
    let user_id = claims.user_id;

    Ok(ws.on_upgrade(move |socket| {
        let stream = EventStream::new(state.broadcaster.subscribe());
        WebSocketConnection::new(socket, state, user_id, stream).run()
    }))
}

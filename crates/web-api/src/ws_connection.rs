//! WebSocket 连接管理器
//!
//! 封装单个 WebSocket 连接的所有状态和逻辑，包括：
//! - 入站帧解析（订阅 / 退订 / 发消息）
//! - 按订阅房间过滤并转发广播事件
//! - Ping/Pong 心跳
//!
//! 一条连接可以同时订阅多个房间；订阅前校验成员资格，
//! 非成员的订阅请求只收到错误帧，不会看到任何事件。

use application::{EventStream, SendMessageRequest};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{MessageType, RoomEvent, RoomId};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

/// 客户端入站帧
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe {
        room_id: Uuid,
    },
    Unsubscribe {
        room_id: Uuid,
    },
    Send {
        room_id: Uuid,
        content: String,
        message_type: Option<MessageType>,
        image_url: Option<String>,
    },
}

/// 服务端出站帧
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Subscribed {
        room_id: Uuid,
    },
    Unsubscribed {
        room_id: Uuid,
    },
    Event {
        #[serde(flatten)]
        event: RoomEvent,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user_id: Uuid,
    stream: EventStream,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: Uuid, stream: EventStream) -> Self {
        tracing::info!(user_id = %user_id, "WebSocket 连接已建立");
        Self {
            socket,
            state,
            user_id,
            stream,
        }
    }

    /// 运行连接主循环：同一个任务里轮转入站帧和广播事件，
    /// 订阅集合的变更立即对事件过滤生效。
    pub async fn run(self) {
        let WebSocketConnection {
            socket,
            state,
            user_id,
            mut stream,
        } = self;
        let (mut sender, mut incoming) = socket.split();

        loop {
            tokio::select! {
                inbound = incoming.next() => {
                    let Some(Ok(message)) = inbound else { break };
                    match handle_incoming(message, &state, user_id, &mut stream).await {
                        Ok(replies) => {
                            let mut closed = false;
                            for reply in replies {
                                if sender.send(reply).await.is_err() {
                                    closed = true;
                                    break;
                                }
                            }
                            if closed {
                                break;
                            }
                        }
                        Err(()) => break,
                    }
                }
                Some(event) = stream.recv() => {
                    let frame = ServerFrame::Event { event };
                    let payload = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize websocket payload");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(user_id = %user_id, "WebSocket 连接已断开");
    }
}

/// 处理一条入站帧，返回需要回写的消息；收到关闭帧时返回 `Err`。
async fn handle_incoming(
    message: WsMessage,
    state: &AppState,
    user_id: Uuid,
    stream: &mut EventStream,
) -> Result<Vec<WsMessage>, ()> {
    match message {
        WsMessage::Close(_) => {
            tracing::debug!(user_id = %user_id, "WebSocket 收到关闭帧");
            Err(())
        }
        WsMessage::Ping(data) => Ok(vec![WsMessage::Pong(data)]),
        WsMessage::Pong(_) => Ok(Vec::new()),
        WsMessage::Binary(_) => Ok(vec![error_frame(
            "UNSUPPORTED_FRAME",
            "binary frames are not supported",
        )]),
        WsMessage::Text(text) => {
            let frame: ClientFrame = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    return Ok(vec![error_frame(
                        "MALFORMED_FRAME",
                        format!("invalid frame: {}", err),
                    )]);
                }
            };
            Ok(handle_frame(frame, state, user_id, stream).await)
        }
    }
}

async fn handle_frame(
    frame: ClientFrame,
    state: &AppState,
    user_id: Uuid,
    stream: &mut EventStream,
) -> Vec<WsMessage> {
    match frame {
        ClientFrame::Subscribe { room_id } => {
            match state.chat_service.is_participant(room_id, user_id).await {
                Ok(true) => {
                    stream.watch_room(RoomId::from(room_id));
                    vec![server_frame(ServerFrame::Subscribed { room_id })]
                }
                Ok(false) => vec![error_frame(
                    "NOT_ROOM_MEMBER",
                    "user is not a participant of this room",
                )],
                Err(err) => vec![error_frame("SUBSCRIBE_FAILED", err.to_string())],
            }
        }
        ClientFrame::Unsubscribe { room_id } => {
            stream.unwatch_room(RoomId::from(room_id));
            vec![server_frame(ServerFrame::Unsubscribed { room_id })]
        }
        ClientFrame::Send {
            room_id,
            content,
            message_type,
            image_url,
        } => {
            let request = SendMessageRequest {
                room_id,
                sender_id: user_id,
                content,
                message_type: message_type.unwrap_or(MessageType::Text),
                image_url,
            };
            // 发送成功没有响应帧，发送方通过自己订阅的广播观察结果
            match state.chat_service.send_message(request).await {
                Ok(_) => Vec::new(),
                Err(err) => {
                    let api_err = crate::error::ApiError::from(err);
                    vec![error_frame(api_err.code(), "failed to send message")]
                }
            }
        }
    }
}

fn server_frame(frame: ServerFrame) -> WsMessage {
    match serde_json::to_string(&frame) {
        Ok(json) => WsMessage::Text(json.into()),
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize server frame");
            WsMessage::Text(r#"{"type":"error","code":"INTERNAL_ERROR","message":"serialization failed"}"#.into())
        }
    }
}

fn error_frame(code: &'static str, message: impl Into<String>) -> WsMessage {
    server_frame(ServerFrame::Error {
        code,
        message: message.into(),
    })
}

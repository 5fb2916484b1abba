//! 传输无关的结果对象。聚合内部结构不直接暴露给任何 ingress 适配器。

use domain::{Message, MessageType, Room, RoomId, RoomType, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub user_id: Uuid,
    pub joined_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub room_id: Uuid,
    pub seq: u64,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub sent_at: Timestamp,
}

impl MessageDto {
    pub fn from_message(room_id: RoomId, message: &Message) -> Self {
        Self {
            id: message.id.into(),
            room_id: room_id.into(),
            seq: message.seq,
            sender_id: message.sender_id.into(),
            content: message.content.as_str().to_owned(),
            message_type: message.message_type,
            image_url: message.image_url.clone(),
            sent_at: message.sent_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDto {
    pub id: Uuid,
    pub name: String,
    pub room_type: RoomType,
    pub created_by: Uuid,
    pub participants: Vec<ParticipantDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Room> for RoomDto {
    fn from(room: &Room) -> Self {
        let last_message_preview = room
            .recent_messages(1)
            .first()
            .map(|message| message.content.preview());

        Self {
            id: room.id().into(),
            name: room.name().to_owned(),
            room_type: room.room_type(),
            created_by: room.created_by().into(),
            participants: room
                .participants()
                .iter()
                .map(|member| ParticipantDto {
                    user_id: member.user_id.into(),
                    joined_at: member.joined_at,
                })
                .collect(),
            last_message_preview,
            created_at: room.created_at(),
            updated_at: room.updated_at(),
        }
    }
}

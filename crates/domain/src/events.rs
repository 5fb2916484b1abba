use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};

/// 广播主题的类别：每个房间有一条消息主题和一条生命周期主题。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicChannel {
    Messages,
    Lifecycle,
}

/// 领域事件。
///
/// 由聚合根的变更操作作为返回值显式产出，应用层在持久化成功之后
/// 负责发布。聚合内部不保留待发布事件的可变状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    MessageSent {
        room_id: RoomId,
        message: Message,
    },
    MessageDeleted {
        room_id: RoomId,
        message_id: MessageId,
        deleted_by: UserId,
    },
    ParticipantJoined {
        room_id: RoomId,
        user_id: UserId,
        joined_at: Timestamp,
    },
    ParticipantLeft {
        room_id: RoomId,
        user_id: UserId,
        left_at: Timestamp,
        /// 最后一名成员离开时为 true，调用方据此删除房间。
        room_deleted: bool,
    },
}

impl RoomEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::MessageSent { room_id, .. }
            | Self::MessageDeleted { room_id, .. }
            | Self::ParticipantJoined { room_id, .. }
            | Self::ParticipantLeft { room_id, .. } => *room_id,
        }
    }

    /// 消息内容事件与成员/生命周期事件走各自独立的主题。
    pub fn channel(&self) -> TopicChannel {
        match self {
            Self::MessageSent { .. } | Self::MessageDeleted { .. } => TopicChannel::Messages,
            Self::ParticipantJoined { .. } | Self::ParticipantLeft { .. } => {
                TopicChannel::Lifecycle
            }
        }
    }
}

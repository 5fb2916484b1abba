use async_trait::async_trait;
use domain::{RoomEvent, RoomId, TopicChannel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 广播主题：每个房间一条消息主题加一条生命周期主题。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomTopic {
    pub room_id: RoomId,
    pub channel: TopicChannel,
}

impl RoomTopic {
    pub fn messages(room_id: RoomId) -> Self {
        Self {
            room_id,
            channel: TopicChannel::Messages,
        }
    }

    pub fn lifecycle(room_id: RoomId) -> Self {
        Self {
            room_id,
            channel: TopicChannel::Lifecycle,
        }
    }

    pub fn for_event(event: &RoomEvent) -> Self {
        Self {
            room_id: event.room_id(),
            channel: event.channel(),
        }
    }
}

/// 发布到订阅者的序列化载荷。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub topic: RoomTopic,
    pub event: RoomEvent,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 发布/订阅扇出的抽象。投递相对触发请求是 fire-and-forget：
/// 慢订阅者或断开的订阅者不得阻塞也不得使发起操作失败。
#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    async fn publish(&self, topic: RoomTopic, event: RoomEvent) -> Result<(), BroadcastError>;
}

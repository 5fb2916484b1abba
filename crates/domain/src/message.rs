use crate::errors::DomainError;
use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "message_type", rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
}

/// 聊天消息。
///
/// 仅能通过 [`Room`](crate::Room) 的发送方法创建，不存在独立生命周期。
/// 除软删除外不可变；`seq` 为房间内单调递增的排序位，由聚合根分配。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub seq: u64,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub message_type: MessageType,
    pub image_url: Option<String>,
    pub sent_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl Message {
    pub(crate) fn new(
        id: MessageId,
        seq: u64,
        sender_id: UserId,
        content: MessageContent,
        message_type: MessageType,
        image_url: Option<String>,
        sent_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if message_type == MessageType::Image
            && image_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(DomainError::invalid_argument(
                "image_url",
                "image messages require an image reference",
            ));
        }
        Ok(Self {
            id,
            seq,
            sender_id,
            content,
            message_type,
            image_url,
            sent_at,
            deleted_at: None,
        })
    }

    /// 仓储重建路径，绕过业务校验但不绕过类型校验。
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: MessageId,
        seq: u64,
        sender_id: UserId,
        content: MessageContent,
        message_type: MessageType,
        image_url: Option<String>,
        sent_at: Timestamp,
        deleted_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            seq,
            sender_id,
            content,
            message_type,
            image_url,
            sent_at,
            deleted_at,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// 软删除：保留内容供审计，投递与已读视图中不再出现。
    pub(crate) fn mark_deleted(&mut self, at: Timestamp) {
        self.deleted_at = Some(at);
    }
}

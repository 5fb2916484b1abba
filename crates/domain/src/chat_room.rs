use std::collections::BTreeSet;

use crate::errors::DomainError;
use crate::events::RoomEvent;
use crate::message::{Message, MessageType};
use crate::value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "room_type", rename_all = "lowercase")]
pub enum RoomType {
    /// 单聊：恰好 2 名成员，按无序用户对去重。
    Direct,
    /// 群聊：至少 2 名成员，带显式名称。
    Group,
}

/// 房间成员关系。
///
/// `last_read_seq` 是该成员的已读游标：入会时等于房间当时的最新序号
/// （加入前的历史不计入未读），之后只能单调前移。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub joined_at: Timestamp,
    pub last_read_seq: u64,
}

impl Participant {
    pub fn new(user_id: UserId, joined_at: Timestamp, last_read_seq: u64) -> Self {
        Self {
            user_id,
            joined_at,
            last_read_seq,
        }
    }
}

/// 规范化单聊的无序用户对：按 ID 排序，拒绝与自己建立单聊。
pub fn direct_pair(a: UserId, b: UserId) -> Result<(UserId, UserId), DomainError> {
    if a == b {
        return Err(DomainError::SelfChat);
    }
    if a < b {
        Ok((a, b))
    } else {
        Ok((b, a))
    }
}

/// 聊天室聚合根。
///
/// 成员集合与消息日志只能通过聚合方法变更；每条消息在追加时获得
/// 房间内单调递增的 `seq`，并发写入由应用层按 RoomId 串行化。
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Room {
    id: RoomId,
    name: String,
    room_type: RoomType,
    created_by: UserId,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    next_seq: u64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Room {
    /// 创建群聊。创建者自动入会，成员去重后必须至少 2 人。
    pub fn create_group(
        id: RoomId,
        name: impl Into<String>,
        created_by: UserId,
        participant_ids: Vec<UserId>,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;

        let mut members: BTreeSet<UserId> = participant_ids.into_iter().collect();
        members.insert(created_by);
        if members.len() < 2 {
            return Err(DomainError::invalid_argument(
                "participants",
                "a group room requires at least 2 distinct participants",
            ));
        }

        let participants = members
            .into_iter()
            .map(|user_id| Participant::new(user_id, now, 0))
            .collect();

        Ok(Self {
            id,
            name,
            room_type: RoomType::Group,
            created_by,
            participants,
            messages: Vec::new(),
            next_seq: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// 创建单聊。`name` 由调用方给出（对端的显示名）。
    pub fn new_direct(
        id: RoomId,
        created_by: UserId,
        other: UserId,
        name: impl Into<String>,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        let (first, second) = direct_pair(created_by, other)?;
        let name = Self::validate_name(name.into())?;

        Ok(Self {
            id,
            name,
            room_type: RoomType::Direct,
            created_by,
            participants: vec![
                Participant::new(first, now, 0),
                Participant::new(second, now, 0),
            ],
            messages: Vec::new(),
            next_seq: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// 仓储重建路径。`next_seq` 从持久化的消息日志推导。
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: RoomId,
        name: String,
        room_type: RoomType,
        created_by: UserId,
        participants: Vec<Participant>,
        mut messages: Vec<Message>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        messages.sort_by_key(|message| message.seq);
        let next_seq = messages.last().map_or(1, |message| message.seq + 1);
        Self {
            id,
            name,
            room_type,
            created_by,
            participants,
            messages,
            next_seq,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// 完整消息日志，含软删除的消息（仅供仓储与审计使用）。
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.participants
            .iter()
            .any(|member| member.user_id == user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// 单聊中 `user_id` 的对端成员。
    pub fn counterpart_of(&self, user_id: UserId) -> Option<UserId> {
        if self.room_type != RoomType::Direct {
            return None;
        }
        self.participants
            .iter()
            .map(|member| member.user_id)
            .find(|id| *id != user_id)
    }

    pub fn send_message(
        &mut self,
        id: MessageId,
        sender_id: UserId,
        content: MessageContent,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        self.append_message(id, sender_id, content, MessageType::Text, None, now)
    }

    pub fn send_image_message(
        &mut self,
        id: MessageId,
        sender_id: UserId,
        content: MessageContent,
        image_url: String,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        self.append_message(
            id,
            sender_id,
            content,
            MessageType::Image,
            Some(image_url),
            now,
        )
    }

    fn append_message(
        &mut self,
        id: MessageId,
        sender_id: UserId,
        content: MessageContent,
        message_type: MessageType,
        image_url: Option<String>,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        if !self.is_participant(sender_id) {
            return Err(DomainError::NotParticipant);
        }

        let seq = self.next_seq;
        let message = Message::new(id, seq, sender_id, content, message_type, image_url, now)?;
        self.next_seq += 1;
        self.messages.push(message.clone());
        self.updated_at = now;

        Ok(RoomEvent::MessageSent {
            room_id: self.id,
            message,
        })
    }

    /// 邀请新成员。邀请人必须已在房间内；单聊不允许扩员。
    pub fn add_participant(
        &mut self,
        new_user_id: UserId,
        invited_by: UserId,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        if self.room_type == RoomType::Direct {
            return Err(DomainError::OperationNotAllowed);
        }
        if !self.is_participant(invited_by) {
            return Err(DomainError::NotParticipant);
        }
        if self.is_participant(new_user_id) {
            return Err(DomainError::AlreadyMember);
        }

        // 入会前的历史不计入未读
        self.participants
            .push(Participant::new(new_user_id, now, self.latest_seq()));
        self.updated_at = now;

        Ok(RoomEvent::ParticipantJoined {
            room_id: self.id,
            user_id: new_user_id,
            joined_at: now,
        })
    }

    /// 移除成员。事件的 `room_deleted` 标记最后一人离开，
    /// 物理删除由调用方通过仓储执行。
    pub fn remove_participant(
        &mut self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        let position = self
            .participants
            .iter()
            .position(|member| member.user_id == user_id)
            .ok_or(DomainError::NotParticipant)?;

        self.participants.remove(position);
        self.updated_at = now;

        Ok(RoomEvent::ParticipantLeft {
            room_id: self.id,
            user_id,
            left_at: now,
            room_deleted: self.participants.is_empty(),
        })
    }

    /// 已读游标单调前移；对已读过的消息重复标记是无操作而非错误。
    pub fn mark_message_read(
        &mut self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        let seq = self
            .messages
            .iter()
            .find(|message| message.id == message_id && !message.is_deleted())
            .map(|message| message.seq)
            .ok_or(DomainError::MessageNotFound)?;

        let member = self
            .participants
            .iter_mut()
            .find(|member| member.user_id == user_id)
            .ok_or(DomainError::NotParticipant)?;

        if seq > member.last_read_seq {
            member.last_read_seq = seq;
        }
        Ok(())
    }

    /// 作者本人的软删除。已删除的消息视作不存在。
    pub fn delete_message(
        &mut self,
        message_id: MessageId,
        deleted_by: UserId,
        now: Timestamp,
    ) -> Result<RoomEvent, DomainError> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == message_id && !message.is_deleted())
            .ok_or(DomainError::MessageNotFound)?;

        if message.sender_id != deleted_by {
            return Err(DomainError::OperationNotAllowed);
        }

        message.mark_deleted(now);

        Ok(RoomEvent::MessageDeleted {
            room_id: self.id,
            message_id,
            deleted_by,
        })
    }

    /// 未读数：已读游标之后、非删除、且并非自己发送的消息条数。
    pub fn unread_count(&self, user_id: UserId) -> Result<u64, DomainError> {
        let member = self
            .participants
            .iter()
            .find(|member| member.user_id == user_id)
            .ok_or(DomainError::NotParticipant)?;

        let count = self
            .messages
            .iter()
            .filter(|message| {
                message.seq > member.last_read_seq
                    && !message.is_deleted()
                    && message.sender_id != user_id
            })
            .count();
        Ok(count as u64)
    }

    /// 最近 `limit` 条未删除消息，新的在前。
    pub fn recent_messages(&self, limit: usize) -> Vec<&Message> {
        self.messages
            .iter()
            .rev()
            .filter(|message| !message.is_deleted())
            .take(limit)
            .collect()
    }

    fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("room_name", "cannot be empty"));
        }
        if trimmed.chars().count() > 100 {
            return Err(DomainError::invalid_argument("room_name", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}

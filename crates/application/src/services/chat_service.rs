//! 聊天用例服务。
//!
//! 所有变更走同一条路径：按键拿锁 -> 加载聚合 -> 单次聚合操作 ->
//! 持久化 -> 发布事件。事件发布严格在持久化成功之后，发布失败
//! 只记日志不回滚（状态已经落库）。

use std::sync::Arc;

use domain::{
    direct_pair, ChatRoomRepository, DomainError, MessageContent, MessageId, MessageType,
    RepositoryError, Room, RoomEvent, RoomId, UserId,
};
use uuid::Uuid;

use crate::{
    broadcaster::{RoomBroadcaster, RoomTopic},
    clock::Clock,
    dto::{MessageDto, RoomDto},
    error::ApplicationError,
    room_locks::KeyedLocks,
};

#[derive(Debug, Clone)]
pub struct CreateGroupRoomRequest {
    pub name: String,
    pub creator_id: Uuid,
    pub participant_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct DirectChatRequest {
    pub requester_id: Uuid,
    pub other_id: Uuid,
    /// 对端显示名，由身份协作方提供；单聊房间名由此派生。
    pub counterpart_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteParticipantRequest {
    pub room_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct LeaveRoomRequest {
    pub room_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct MarkReadRequest {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct DeleteMessageRequest {
    pub room_id: Uuid,
    pub message_id: Uuid,
    pub requester_id: Uuid,
}

pub struct ChatServiceDependencies {
    pub room_repository: Arc<dyn ChatRoomRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
    room_locks: KeyedLocks<RoomId>,
    pair_locks: KeyedLocks<(UserId, UserId)>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self {
            deps,
            room_locks: KeyedLocks::new(),
            pair_locks: KeyedLocks::new(),
        }
    }

    pub async fn create_group_room(
        &self,
        request: CreateGroupRoomRequest,
    ) -> Result<RoomDto, ApplicationError> {
        let creator = UserId::from(request.creator_id);
        let participants = request
            .participant_ids
            .into_iter()
            .map(UserId::from)
            .collect();
        let now = self.deps.clock.now();

        let room = Room::create_group(
            RoomId::from(Uuid::new_v4()),
            request.name,
            creator,
            participants,
            now,
        )?;
        let saved = self.deps.room_repository.save(room).await?;

        tracing::info!(room_id = %saved.id(), creator = %creator, "group room created");
        Ok(RoomDto::from(&saved))
    }

    /// 单聊查找或创建：同一无序用户对至多一个单聊房间。
    ///
    /// 先乐观查找；未命中则在对级锁内二次检查后创建。仓储的唯一
    /// 约束兜底跨进程竞争，`Conflict` 视作「别人先建好了」。
    pub async fn find_or_create_direct_chat(
        &self,
        request: DirectChatRequest,
    ) -> Result<RoomDto, ApplicationError> {
        let requester = UserId::from(request.requester_id);
        let other = UserId::from(request.other_id);
        let pair = direct_pair(requester, other)?;

        if let Some(room) = self
            .deps
            .room_repository
            .find_direct_between(requester, other)
            .await?
        {
            return Ok(RoomDto::from(&room));
        }

        let _guard = self.pair_locks.acquire(pair).await;

        if let Some(room) = self
            .deps
            .room_repository
            .find_direct_between(requester, other)
            .await?
        {
            return Ok(RoomDto::from(&room));
        }

        let name = request
            .counterpart_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| other.to_string());
        let now = self.deps.clock.now();
        let room = Room::new_direct(RoomId::from(Uuid::new_v4()), requester, other, name, now)?;

        match self.deps.room_repository.save(room).await {
            Ok(saved) => {
                tracing::info!(room_id = %saved.id(), "direct chat created");
                Ok(RoomDto::from(&saved))
            }
            Err(RepositoryError::Conflict) => {
                let existing = self
                    .deps
                    .room_repository
                    .find_direct_between(requester, other)
                    .await?
                    .ok_or(ApplicationError::Repository(RepositoryError::Conflict))?;
                Ok(RoomDto::from(&existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let room_id = RoomId::from(request.room_id);
        let sender = UserId::from(request.sender_id);
        let content = MessageContent::new(request.content)?;

        let _guard = self.room_locks.acquire(room_id).await;

        let mut room = self.load(room_id).await?;
        let message_id = MessageId::from(Uuid::new_v4());
        let now = self.deps.clock.now();

        let event = match request.message_type {
            MessageType::Text => room.send_message(message_id, sender, content, now)?,
            MessageType::Image => {
                let image_url = request.image_url.unwrap_or_default();
                room.send_image_message(message_id, sender, content, image_url, now)?
            }
        };

        self.deps.room_repository.save(room).await?;

        let dto = match &event {
            RoomEvent::MessageSent { room_id, message } => {
                MessageDto::from_message(*room_id, message)
            }
            _ => unreachable!("send_message emits MessageSent"),
        };
        self.publish(event).await;
        Ok(dto)
    }

    pub async fn invite_participant(
        &self,
        request: InviteParticipantRequest,
    ) -> Result<RoomDto, ApplicationError> {
        let room_id = RoomId::from(request.room_id);
        let _guard = self.room_locks.acquire(room_id).await;

        let mut room = self.load(room_id).await?;
        let event = room.add_participant(
            UserId::from(request.invitee_id),
            UserId::from(request.inviter_id),
            self.deps.clock.now(),
        )?;

        let saved = self.deps.room_repository.save(room).await?;
        self.publish(event).await;
        Ok(RoomDto::from(&saved))
    }

    /// 离开房间；最后一名成员离开时级联删除房间本体。
    pub async fn leave_room(&self, request: LeaveRoomRequest) -> Result<(), ApplicationError> {
        let room_id = RoomId::from(request.room_id);
        let _guard = self.room_locks.acquire(room_id).await;

        let mut room = self.load(room_id).await?;
        let event = room.remove_participant(UserId::from(request.user_id), self.deps.clock.now())?;

        let room_deleted = matches!(
            event,
            RoomEvent::ParticipantLeft {
                room_deleted: true,
                ..
            }
        );
        if room_deleted {
            self.deps.room_repository.delete(room_id).await?;
            tracing::info!(room_id = %room_id, "room deleted after last participant left");
        } else {
            self.deps.room_repository.save(room).await?;
        }

        self.publish(event).await;
        Ok(())
    }

    pub async fn mark_message_read(&self, request: MarkReadRequest) -> Result<(), ApplicationError> {
        let room_id = RoomId::from(request.room_id);
        let _guard = self.room_locks.acquire(room_id).await;

        let mut room = self.load(room_id).await?;
        room.mark_message_read(
            MessageId::from(request.message_id),
            UserId::from(request.user_id),
        )?;
        self.deps.room_repository.save(room).await?;
        Ok(())
    }

    pub async fn delete_message(
        &self,
        request: DeleteMessageRequest,
    ) -> Result<(), ApplicationError> {
        let room_id = RoomId::from(request.room_id);
        let _guard = self.room_locks.acquire(room_id).await;

        let mut room = self.load(room_id).await?;
        let event = room.delete_message(
            MessageId::from(request.message_id),
            UserId::from(request.requester_id),
            self.deps.clock.now(),
        )?;

        self.deps.room_repository.save(room).await?;
        self.publish(event).await;
        Ok(())
    }

    pub async fn get_room(
        &self,
        room_id: Uuid,
        requester_id: Uuid,
    ) -> Result<RoomDto, ApplicationError> {
        let room = self.load(RoomId::from(room_id)).await?;
        if !room.is_participant(UserId::from(requester_id)) {
            return Err(ApplicationError::AccessDenied);
        }
        Ok(RoomDto::from(&room))
    }

    pub async fn list_rooms(&self, user_id: Uuid) -> Result<Vec<RoomDto>, ApplicationError> {
        let rooms = self
            .deps
            .room_repository
            .list_for_user(UserId::from(user_id))
            .await?;
        Ok(rooms.iter().map(RoomDto::from).collect())
    }

    /// 最近消息，新的在前。非成员拒绝访问，不泄露任何内容。
    pub async fn recent_messages(
        &self,
        room_id: Uuid,
        requester_id: Uuid,
        limit: u32,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        let room = self.load(RoomId::from(room_id)).await?;
        if !room.is_participant(UserId::from(requester_id)) {
            return Err(ApplicationError::AccessDenied);
        }
        Ok(room
            .recent_messages(limit as usize)
            .into_iter()
            .map(|message| MessageDto::from_message(room.id(), message))
            .collect())
    }

    pub async fn unread_count(
        &self,
        room_id: Uuid,
        requester_id: Uuid,
    ) -> Result<u64, ApplicationError> {
        let room = self.load(RoomId::from(room_id)).await?;
        room.unread_count(UserId::from(requester_id))
            .map_err(|err| match err {
                DomainError::NotParticipant => ApplicationError::AccessDenied,
                other => other.into(),
            })
    }

    pub async fn is_participant(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, ApplicationError> {
        let room = self.load(RoomId::from(room_id)).await?;
        Ok(room.is_participant(UserId::from(user_id)))
    }

    async fn load(&self, room_id: RoomId) -> Result<Room, ApplicationError> {
        self.deps
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| DomainError::RoomNotFound.into())
    }

    async fn publish(&self, event: RoomEvent) {
        let topic = RoomTopic::for_event(&event);
        if let Err(err) = self.deps.broadcaster.publish(topic, event).await {
            // 状态已落库，投递层故障不回滚
            tracing::warn!(
                error = %err,
                room_id = %topic.room_id,
                "event publish failed after commit"
            );
        }
    }
}

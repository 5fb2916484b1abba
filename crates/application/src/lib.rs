//! 应用层：用例编排。
//!
//! 每个用户意图对应一个服务方法：加载聚合 -> 调用一次聚合操作 ->
//! 持久化 -> 发布领域事件 -> 返回传输无关的 DTO。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod local_broadcast;
pub mod room_locks;
pub mod services;

pub use broadcaster::{BroadcastError, EventEnvelope, RoomBroadcaster, RoomTopic};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dto::{MessageDto, ParticipantDto, RoomDto};
pub use error::ApplicationError;
pub use local_broadcast::{EventStream, LocalRoomBroadcaster};
pub use room_locks::KeyedLocks;
pub use services::{
    ChatService, ChatServiceDependencies, CreateGroupRoomRequest, DeleteMessageRequest,
    DirectChatRequest, InviteParticipantRequest, LeaveRoomRequest, MarkReadRequest,
    SendMessageRequest,
};

//! 聊天核心领域模型
//!
//! 聊天室聚合根、消息值对象、领域事件与仓储契约。
//! 所有成员与消息的不变量由聚合根自身维护，外部层只能调用聚合方法。

pub mod chat_room;
pub mod errors;
pub mod events;
pub mod message;
pub mod repository;
pub mod value_objects;

#[cfg(test)]
mod chat_room_tests;

pub use chat_room::{direct_pair, Participant, Room, RoomType};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use events::{RoomEvent, TopicChannel};
pub use message::{Message, MessageType};
pub use repository::{ChatRoomRepository, RepositoryFuture, RepositoryResult};
pub use value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId};

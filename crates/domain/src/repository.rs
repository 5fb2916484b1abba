use futures::future::BoxFuture;

use crate::chat_room::Room;
use crate::errors::RepositoryError;
use crate::value_objects::{RoomId, UserId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type RepositoryFuture<T> = BoxFuture<'static, RepositoryResult<T>>;

/// 聊天室聚合的仓储契约。
///
/// `save` 覆盖写整个聚合（房间、成员、消息日志）。对单聊，实现方必须
/// 维护 (type=direct, 无序用户对) 的唯一性，冲突时返回
/// [`RepositoryError::Conflict`] 而不是写入第二个房间。
pub trait ChatRoomRepository: Send + Sync {
    fn save(&self, room: Room) -> RepositoryFuture<Room>;
    fn find_by_id(&self, id: RoomId) -> RepositoryFuture<Option<Room>>;
    fn find_direct_between(&self, a: UserId, b: UserId) -> RepositoryFuture<Option<Room>>;
    fn list_for_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Room>>;
    fn delete(&self, id: RoomId) -> RepositoryFuture<()>;
}

//! 内存仓储。按无序用户对维护单聊唯一索引，语义与 Pg 实现一致。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    direct_pair, ChatRoomRepository, RepositoryError, RepositoryFuture, Room, RoomId, RoomType,
    UserId,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    rooms: HashMap<RoomId, Room>,
    direct_index: HashMap<(UserId, UserId), RoomId>,
}

#[derive(Clone, Default)]
pub struct InMemoryChatRoomRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryChatRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单聊的无序用户对；成员不足两人（有人已退出）时返回 `None`。
    fn pair_of(room: &Room) -> Result<Option<(UserId, UserId)>, RepositoryError> {
        let members: Vec<UserId> = room.participants().iter().map(|p| p.user_id).collect();
        match members.as_slice() {
            [a, b] => direct_pair(*a, *b)
                .map(Some)
                .map_err(|err| RepositoryError::storage(err.to_string())),
            _ => Ok(None),
        }
    }
}

impl ChatRoomRepository for InMemoryChatRoomRepository {
    fn save(&self, room: Room) -> RepositoryFuture<Room> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut guard = state.write().await;
            if room.room_type() == RoomType::Direct {
                match Self::pair_of(&room)? {
                    Some(pair) => {
                        if let Some(existing) = guard.direct_index.get(&pair) {
                            if *existing != room.id() {
                                return Err(RepositoryError::Conflict);
                            }
                        }
                        guard.direct_index.insert(pair, room.id());
                    }
                    // 有人退出后释放唯一性占位
                    None => {
                        guard.direct_index.retain(|_, room_id| *room_id != room.id());
                    }
                }
            }
            guard.rooms.insert(room.id(), room.clone());
            Ok(room)
        })
    }

    fn find_by_id(&self, id: RoomId) -> RepositoryFuture<Option<Room>> {
        let state = self.state.clone();
        Box::pin(async move { Ok(state.read().await.rooms.get(&id).cloned()) })
    }

    fn find_direct_between(&self, a: UserId, b: UserId) -> RepositoryFuture<Option<Room>> {
        let state = self.state.clone();
        Box::pin(async move {
            let pair = match direct_pair(a, b) {
                Ok(pair) => pair,
                Err(_) => return Ok(None),
            };
            let guard = state.read().await;
            Ok(guard
                .direct_index
                .get(&pair)
                .and_then(|id| guard.rooms.get(id))
                .cloned())
        })
    }

    fn list_for_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Room>> {
        let state = self.state.clone();
        Box::pin(async move {
            let guard = state.read().await;
            let mut rooms: Vec<Room> = guard
                .rooms
                .values()
                .filter(|room| room.is_participant(user_id))
                .cloned()
                .collect();
            // 最近活跃的在前
            rooms.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
            Ok(rooms)
        })
    }

    fn delete(&self, id: RoomId) -> RepositoryFuture<()> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut guard = state.write().await;
            if guard.rooms.remove(&id).is_some() {
                guard.direct_index.retain(|_, room_id| *room_id != id);
            }
            Ok(())
        })
    }
}

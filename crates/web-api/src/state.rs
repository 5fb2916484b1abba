use std::sync::Arc;

use application::{ChatService, LocalRoomBroadcaster};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    /// 具体类型而非 trait 对象：WebSocket 适配器需要 `subscribe()`。
    pub broadcaster: Arc<LocalRoomBroadcaster>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        broadcaster: Arc<LocalRoomBroadcaster>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat_service,
            broadcaster,
            jwt_service,
        }
    }
}

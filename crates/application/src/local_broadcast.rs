//! 进程内广播器：单条 `tokio::sync::broadcast` 通道承载全部主题，
//! 订阅端按主题过滤。落后的接收者丢事件而不是反压发布者。

use std::collections::HashSet;

use async_trait::async_trait;
use domain::{RoomEvent, RoomId};
use tokio::sync::broadcast;

use crate::broadcaster::{BroadcastError, EventEnvelope, RoomBroadcaster, RoomTopic};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct LocalRoomBroadcaster {
    sender: broadcast::Sender<EventEnvelope>,
}

impl LocalRoomBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalRoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomBroadcaster for LocalRoomBroadcaster {
    async fn publish(&self, topic: RoomTopic, event: RoomEvent) -> Result<(), BroadcastError> {
        // 没有任何订阅者不算失败
        let _ = self.sender.send(EventEnvelope { topic, event });
        Ok(())
    }
}

/// 按房间集合过滤的事件流，供持久连接适配器转发广播。
pub struct EventStream {
    receiver: broadcast::Receiver<EventEnvelope>,
    rooms: HashSet<RoomId>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<EventEnvelope>) -> Self {
        Self {
            receiver,
            rooms: HashSet::new(),
        }
    }

    pub fn watch_room(&mut self, room_id: RoomId) {
        self.rooms.insert(room_id);
    }

    pub fn unwatch_room(&mut self, room_id: RoomId) {
        self.rooms.remove(&room_id);
    }

    pub fn is_watching(&self, room_id: RoomId) -> bool {
        self.rooms.contains(&room_id)
    }

    /// 下一条属于已订阅房间的事件；通道关闭时返回 `None`。
    /// 接收落后导致的丢失只记录日志，流继续。
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self.rooms.contains(&envelope.topic.room_id) {
                        return Some(envelope.event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event stream lagged, dropping missed events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

//! 基础设施层：仓储实现。
//!
//! PostgreSQL 实现用于生产，内存实现用于测试与无库运行。
//! 两者都维护单聊 (type, 无序用户对) 的唯一性并以 `Conflict` 上报。

pub mod db;
pub mod memory;

pub use db::{create_pg_pool, PgChatRoomRepository};
pub use memory::InMemoryChatRoomRepository;

//! PostgreSQL 聊天室仓储。
//!
//! `save` 在单个事务内覆盖写整个聚合。单聊唯一性由
//! `uq_rooms_direct_pair` 部分唯一索引保证，违反时上报 `Conflict`。

use domain::{
    direct_pair, ChatRoomRepository, MessageContent, MessageId, MessageType, Participant,
    RepositoryError, RepositoryFuture, Room, RoomId, RoomType, UserId,
};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// 单聊的无序用户对键。成员不足两人（有人已退出）时返回 `None`，
/// 释放唯一索引占位，同一对用户可以再开新的单聊。
fn pair_key(room: &Room) -> Result<Option<String>, RepositoryError> {
    if room.room_type() != RoomType::Direct {
        return Ok(None);
    }
    let members: Vec<UserId> = room.participants().iter().map(|p| p.user_id).collect();
    match members.as_slice() {
        [a, b] => {
            let (first, second) =
                direct_pair(*a, *b).map_err(|err| invalid_data(err.to_string()))?;
            Ok(Some(format!("{first}:{second}")))
        }
        _ => Ok(None),
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: String,
    room_type: RoomType,
    created_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    user_id: Uuid,
    joined_at: OffsetDateTime,
    last_read_seq: i64,
}

impl From<ParticipantRecord> for Participant {
    fn from(value: ParticipantRecord) -> Self {
        Participant::new(
            UserId::from(value.user_id),
            value.joined_at,
            value.last_read_seq as u64,
        )
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    seq: i64,
    sender_id: Uuid,
    content: String,
    message_type: MessageType,
    image_url: Option<String>,
    sent_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<MessageRecord> for domain::Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(domain::Message::restore(
            MessageId::from(value.id),
            value.seq as u64,
            UserId::from(value.sender_id),
            content,
            value.message_type,
            value.image_url,
            value.sent_at,
            value.deleted_at,
        ))
    }
}

#[derive(Clone)]
pub struct PgChatRoomRepository {
    pool: PgPool,
}

impl PgChatRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(pool: &PgPool, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let room_record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, room_type, created_by, created_at, updated_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_err)?;

        let Some(room_record) = room_record else {
            return Ok(None);
        };

        let participants = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT user_id, joined_at, last_read_seq
            FROM room_participants
            WHERE room_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_err)?
        .into_iter()
        .map(Participant::from)
        .collect();

        let messages = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, seq, sender_id, content, message_type, image_url, sent_at, deleted_at
            FROM messages
            WHERE room_id = $1
            ORDER BY seq
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_err)?
        .into_iter()
        .map(domain::Message::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Room::restore(
            RoomId::from(room_record.id),
            room_record.name,
            room_record.room_type,
            UserId::from(room_record.created_by),
            participants,
            messages,
            room_record.created_at,
            room_record.updated_at,
        )))
    }
}

impl ChatRoomRepository for PgChatRoomRepository {
    fn save(&self, room: Room) -> RepositoryFuture<Room> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let direct_pair_key = pair_key(&room)?;
            let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

            sqlx::query(
                r#"
                INSERT INTO rooms (id, name, room_type, created_by, direct_pair_key, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    direct_pair_key = EXCLUDED.direct_pair_key,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(Uuid::from(room.id()))
            .bind(room.name())
            .bind(room.room_type())
            .bind(Uuid::from(room.created_by()))
            .bind(&direct_pair_key)
            .bind(room.created_at())
            .bind(room.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            let member_ids: Vec<Uuid> = room
                .participants()
                .iter()
                .map(|member| Uuid::from(member.user_id))
                .collect();

            sqlx::query(
                r#"
                DELETE FROM room_participants
                WHERE room_id = $1 AND user_id <> ALL($2)
                "#,
            )
            .bind(Uuid::from(room.id()))
            .bind(&member_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            for member in room.participants() {
                sqlx::query(
                    r#"
                    INSERT INTO room_participants (room_id, user_id, joined_at, last_read_seq)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (room_id, user_id) DO UPDATE
                    SET last_read_seq = EXCLUDED.last_read_seq
                    "#,
                )
                .bind(Uuid::from(room.id()))
                .bind(Uuid::from(member.user_id))
                .bind(member.joined_at)
                .bind(member.last_read_seq as i64)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            }

            for message in room.messages() {
                sqlx::query(
                    r#"
                    INSERT INTO messages
                        (id, room_id, seq, sender_id, content, message_type, image_url, sent_at, deleted_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ON CONFLICT (id) DO UPDATE
                    SET deleted_at = EXCLUDED.deleted_at
                    "#,
                )
                .bind(Uuid::from(message.id))
                .bind(Uuid::from(room.id()))
                .bind(message.seq as i64)
                .bind(Uuid::from(message.sender_id))
                .bind(message.content.as_str())
                .bind(message.message_type)
                .bind(&message.image_url)
                .bind(message.sent_at)
                .bind(message.deleted_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            }

            tx.commit().await.map_err(map_sqlx_err)?;
            Ok(room)
        })
    }

    fn find_by_id(&self, id: RoomId) -> RepositoryFuture<Option<Room>> {
        let pool = self.pool.clone();
        Box::pin(async move { Self::load(&pool, id).await })
    }

    fn find_direct_between(&self, a: UserId, b: UserId) -> RepositoryFuture<Option<Room>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let (first, second) = match direct_pair(a, b) {
                Ok(pair) => pair,
                Err(_) => return Ok(None),
            };
            let key = format!("{first}:{second}");

            let room_id: Option<Uuid> = sqlx::query_scalar(
                r#"
                SELECT id FROM rooms
                WHERE room_type = 'direct' AND direct_pair_key = $1
                "#,
            )
            .bind(&key)
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            match room_id {
                Some(id) => Self::load(&pool, RoomId::from(id)).await,
                None => Ok(None),
            }
        })
    }

    fn list_for_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Room>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let room_ids: Vec<Uuid> = sqlx::query_scalar(
                r#"
                SELECT p.room_id
                FROM room_participants p
                JOIN rooms r ON r.id = p.room_id
                WHERE p.user_id = $1
                ORDER BY r.updated_at DESC
                "#,
            )
            .bind(Uuid::from(user_id))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            let mut rooms = Vec::with_capacity(room_ids.len());
            for id in room_ids {
                if let Some(room) = Self::load(&pool, RoomId::from(id)).await? {
                    rooms.push(room);
                }
            }
            Ok(rooms)
        })
    }

    fn delete(&self, id: RoomId) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // 成员与消息随房间级联删除
            sqlx::query("DELETE FROM rooms WHERE id = $1")
                .bind(Uuid::from(id))
                .execute(&pool)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
    }
}

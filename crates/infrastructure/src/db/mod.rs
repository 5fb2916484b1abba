use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod room_repository_impl;

pub use room_repository_impl::PgChatRoomRepository;

pub async fn create_pg_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

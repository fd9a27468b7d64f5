//! Persistence for rooms and readings.
//!
//! The handler talks to storage only through [`ReadingStore`], so the request
//! path can be exercised without a database. [`PgStore`] is the production
//! implementation.

use async_trait::async_trait;
use sqlx::{Executor, PgPool};

use crate::models::{NewReading, Reading, Room, RoomId};

// ---

/// Insert the room if its name is new, otherwise read the existing row.
/// An existing row is never written. Both branches share one snapshot, so a
/// name committed concurrently after that snapshot yields no row at all.
const ENSURE_ROOM: &str = r#"
    WITH inserted AS (
        INSERT INTO rooms (name) VALUES ($1)
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name
    )
    SELECT id, name, true AS created FROM inserted
    UNION ALL
    SELECT id, name, false AS created FROM rooms WHERE name = $1
    LIMIT 1
"#;

/// Re-read after a concurrent insert; a fresh statement sees the new row.
const FIND_ROOM: &str = "SELECT id, name FROM rooms WHERE name = $1";

const INSERT_READING: &str = r#"
    INSERT INTO tempdata (roomid, time, temperature) VALUES ($1, $2, $3)
    RETURNING id, roomid, time, temperature
"#;

/// Result of resolving a room name to its row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoom {
    pub room: Room,
    /// `true` when this call inserted the row.
    pub created: bool,
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Return the room called `name`, creating it first if it does not exist.
    ///
    /// Must be a single atomic operation: concurrent callers with the same
    /// unseen name all receive the same row.
    async fn ensure_room(&self, name: &str) -> Result<ResolvedRoom, sqlx::Error>;

    async fn insert_reading(&self, reading: &NewReading) -> Result<Reading, sqlx::Error>;
}

/// [`ReadingStore`] backed by the `rooms` and `tempdata` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build the store after checking that its statements prepare cleanly.
    ///
    /// Called once at startup so a schema mismatch aborts the process instead
    /// of failing every request.
    pub async fn prepare(pool: PgPool) -> Result<Self, sqlx::Error> {
        // ---
        for sql in [ENSURE_ROOM, FIND_ROOM, INSERT_READING] {
            pool.prepare(sql).await?;
        }
        tracing::debug!("Storage statements prepared");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn ensure_room(&self, name: &str) -> Result<ResolvedRoom, sqlx::Error> {
        // ---
        let row: Option<(RoomId, String, bool)> = sqlx::query_as(ENSURE_ROOM)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some((id, name, created)) = row {
            return Ok(ResolvedRoom {
                room: Room { id, name },
                created,
            });
        }

        tracing::debug!(room = %name, "Room inserted concurrently, reading it back");
        let room = sqlx::query_as::<_, Room>(FIND_ROOM)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        Ok(ResolvedRoom {
            room,
            created: false,
        })
    }

    async fn insert_reading(&self, reading: &NewReading) -> Result<Reading, sqlx::Error> {
        // ---
        sqlx::query_as::<_, Reading>(INSERT_READING)
            .bind(reading.room_id)
            .bind(reading.stored_time())
            .bind(reading.temperature)
            .fetch_one(&self.pool)
            .await
    }
}


#[cfg(test)]
mod tests {
    // ---
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    use super::*;

    fn env_or(key: &str, default: &str) -> String {
        std::env::var(key).unwrap_or_else(|_| default.into())
    }

    async fn pg_store() -> PgStore {
        // ---
        let opts = PgConnectOptions::new()
            .host(&env_or("DATABASE_HOST", "localhost"))
            .username(&env_or("DATABASE_USER", "postgres"))
            .password(&env_or("DATABASE_PASSWORD", "postgres"))
            .database(&env_or("DATABASE_NAME", "postgres"));
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(opts)
            .await
            .unwrap();
        crate::schema::create_schema(&pool).await.unwrap();
        PgStore::prepare(pool).await.unwrap()
    }

    async fn ctid(store: &PgStore, name: &str) -> String {
        let (ctid,): (String,) = sqlx::query_as("SELECT ctid::text FROM rooms WHERE name = $1")
            .bind(name)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        ctid
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    async fn test_existing_room_row_is_not_rewritten() {
        // ---
        let store = pg_store().await;
        let name = format!(
            "untouched-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
        );

        let first = store.ensure_room(&name).await.unwrap();
        assert!(first.created);
        let before = ctid(&store, &name).await;

        for _ in 0..3 {
            let again = store.ensure_room(&name).await.unwrap();
            assert!(!again.created);
            assert_eq!(again.room, first.room);
        }

        // An UPDATE would have moved the tuple.
        assert_eq!(ctid(&store, &name).await, before);
    }
}

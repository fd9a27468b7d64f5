//! Database schema management for `roomtemp-ingest`.
//!
//! Ensures the `rooms` and `tempdata` tables exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or upgrade the database schema (idempotent).
///
/// Databases created by earlier deployments have no uniqueness constraint on
/// `rooms.name`; the unique index is added here so the room upsert in
/// [`crate::store::PgStore`] has a conflict target. That index creation fails
/// if such a database already holds duplicate names, which aborts startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id   SERIAL       PRIMARY KEY NOT NULL,
            name VARCHAR(255) NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_name
            ON rooms (name);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tempdata (
            id          SERIAL    PRIMARY KEY NOT NULL,
            roomid      INTEGER   NOT NULL REFERENCES rooms (id),
            time        TIMESTAMP NOT NULL,
            temperature REAL      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_tempdata_roomid
            ON tempdata (roomid);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

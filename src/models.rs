//! Data models for rooms and their temperature readings.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;

// ---

/// Server-assigned `rooms.id`.
pub type RoomId = i32;

/// Server-assigned `tempdata.id`.
pub type ReadingId = i32;

/// A row in `rooms`. Created lazily the first time a name is submitted.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Room {
    // ---
    pub id: RoomId,
    pub name: String,
}

/// A row in `tempdata`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: ReadingId,
    #[sqlx(rename = "roomid")]
    pub room_id: RoomId,
    /// Wall-clock time in the configured zone.
    pub time: NaiveDateTime,
    pub temperature: f32,
}

/// A validated reading waiting to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    // ---
    pub room_id: RoomId,
    pub time: DateTime<Tz>,
    pub temperature: f32,
}

impl NewReading {
    /// Value bound to the `TIMESTAMP` column: the local time of the instant.
    pub fn stored_time(&self) -> NaiveDateTime {
        self.time.naive_local()
    }
}

/// Convert seconds since the Unix epoch into an instant in `tz`.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn zoned_instant(secs: i64, tz: Tz) -> Option<DateTime<Tz>> {
    // ---
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&tz))
}

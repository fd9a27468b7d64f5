// src/routes/submit.rs
//! The submit-reading endpoint.
//!
//! `POST /?token=<secret>&time=<unix-seconds>&room=<name>&temp=<celsius>`
//!
//! Every method is routed here so that non-POST requests get a 405 from the
//! handler itself. Parameters are checked in a fixed order (token, time,
//! room, temp) and the first failure decides the response. A valid request
//! resolves the room (creating it on first use) and inserts one reading.
//! Success is a bare 200.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, StatusCode},
    routing::any,
    Router,
};
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::{zoned_instant, IngestError, IngestSettings, NewReading, ReadingStore};

// ---

pub type AppState = (Arc<dyn ReadingStore>, IngestSettings);

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/", any(handler))
}

async fn handler(
    method: Method,
    State((store, settings)): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<StatusCode, IngestError> {
    // ---
    if method != Method::POST {
        return Err(IngestError::MethodNotAllowed);
    }

    let Query(pairs) = query.map_err(|e| IngestError::MalformedQuery(e.body_text()))?;
    let submission = SubmitParams::from_pairs(pairs).validate(&settings)?;

    let resolved = store.ensure_room(&submission.room).await?;
    if resolved.created {
        info!(room = %resolved.room.name, room_id = resolved.room.id, "Created room");
    }

    let reading = store
        .insert_reading(&NewReading {
            room_id: resolved.room.id,
            time: submission.time,
            temperature: submission.temperature,
        })
        .await?;

    debug!(
        reading_id = reading.id,
        room_id = reading.room_id,
        time = %reading.time,
        temperature = reading.temperature,
        "Stored reading"
    );
    Ok(StatusCode::OK)
}

/// Raw query parameters. Empty values count as missing.
#[derive(Debug, Default)]
pub struct SubmitParams {
    token: Option<String>,
    time: Option<String>,
    room: Option<String>,
    temp: Option<String>,
}

/// A submission that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub time: DateTime<Tz>,
    pub room: String,
    pub temperature: f32,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SubmitParams {
    /// Keep the first value of each known key; repeats and unknown keys are
    /// ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        // ---
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "token" => &mut params.token,
                "time" => &mut params.time,
                "room" => &mut params.room,
                "temp" => &mut params.temp,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    /// Check the parameters in contract order and convert them.
    pub fn validate(self, settings: &IngestSettings) -> Result<Submission, IngestError> {
        // ---
        let token = present(self.token).ok_or(IngestError::MissingToken)?;
        if token != settings.access_token {
            return Err(IngestError::WrongToken);
        }

        let raw_time = present(self.time).ok_or(IngestError::MissingParam("time"))?;
        let secs = raw_time.parse::<i64>().map_err(IngestError::InvalidTime)?;
        let time = zoned_instant(secs, settings.timezone).ok_or(IngestError::TimeOutOfRange(secs))?;

        let room = present(self.room).ok_or(IngestError::MissingParam("room"))?;

        let raw_temp = present(self.temp).ok_or(IngestError::MissingParam("temp"))?;
        let temperature = raw_temp.parse::<f32>().map_err(IngestError::InvalidTemp)?;
        if !temperature.is_finite() {
            return Err(IngestError::NonFiniteTemp);
        }

        Ok(Submission {
            time,
            room,
            temperature,
        })
    }
}

//! `POST /deadletter/{function}`: parse a deferred call and admit it.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{ApiError, AppState};
use crate::domain::{CallDefinition, DEFAULT_RESTART_DELAY};
use crate::error::MailboxError;
use crate::impls::gateway::{HEADER_DELAY_DURATION, HEADER_MAX_RETRIES, HEADER_RETRIES};

/// Body of a 202: the display form of the assigned id (`req-...`).
#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub id: String,
}

#[instrument(
    name = "admit",
    skip_all,
    fields(function = %function, body_len = body.len())
)]
pub async fn admit(
    State(state): State<AppState>,
    Path(function): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let restart_delay = header_u64(&headers, HEADER_DELAY_DURATION)?
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RESTART_DELAY);
    let retries = header_u32(&headers, HEADER_RETRIES)?.unwrap_or(0);
    let max_retries = header_u32(&headers, HEADER_MAX_RETRIES)?.unwrap_or(0);

    let definition = CallDefinition::new(function, body)?
        .with_query(query)
        .with_headers(forwardable_headers(&headers))
        .with_max_retries(max_retries)
        .with_restart_delay(restart_delay);

    match state.queue.add(definition, retries).await {
        Ok(id) => {
            state.metrics.record_admission();
            info!(
                request_id = %id,
                retries,
                max_retries,
                delay_secs = restart_delay.as_secs(),
                "admitted"
            );
            Ok((StatusCode::ACCEPTED, Json(AdmissionResponse { id: id.to_string() })))
        }
        Err(err @ MailboxError::QueueFull { .. }) => {
            state.metrics.record_rejection();
            warn!("admission refused: {err}");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Matches `/deadletter` and `/deadletter/` (no function segment).
pub async fn missing_function() -> ApiError {
    MailboxError::MissingFunction.into()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, MailboxError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| MailboxError::InvalidHeader {
        name,
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })?;
    let value = value.trim();
    Ok((!value.is_empty()).then_some(value))
}

fn header_u64(headers: &HeaderMap, name: &'static str) -> Result<Option<u64>, MailboxError> {
    header_str(headers, name)?
        .map(|v| {
            v.parse::<u64>().map_err(|_| MailboxError::InvalidHeader {
                name,
                value: v.to_string(),
            })
        })
        .transpose()
}

fn header_u32(headers: &HeaderMap, name: &'static str) -> Result<Option<u32>, MailboxError> {
    header_str(headers, name)?
        .map(|v| {
            v.parse::<u32>().map_err(|_| MailboxError::InvalidHeader {
                name,
                value: v.to_string(),
            })
        })
        .transpose()
}

/// Caller headers kept on the request; non-UTF-8 values are skipped.
/// The relay decides which of these actually go out.
fn forwardable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

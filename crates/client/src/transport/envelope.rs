// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend response envelope handling.
//!
//! Most endpoints answer `{"message": ..., "status": ..., "data": ...}`.
//! Callers want `data`; error paths want `message`.

use serde_json::Value;

use crate::error::ClientError;

/// Parse a response body. Blank bodies become `null`.
pub fn parse_body(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
}

/// Return `data` when the body is an envelope with a non-null `data`.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_owned(), data);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Human-readable error message from an error body, if the backend sent one.
pub fn error_message(body: &Value) -> Option<String> {
    let candidate = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(|e| e.get("message")).and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))?;
    if candidate.trim().is_empty() {
        None
    } else {
        Some(candidate.to_owned())
    }
}

/// Turn a non-success response into [`ClientError::Status`].
pub async fn status_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status();
    let body = resp.bytes().await.ok().and_then(|b| parse_body(&b).ok()).unwrap_or(Value::Null);
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
    ClientError::Status { status: status.as_u16(), message }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;

//! Wire message model for the line-delimited JSON protocol.
//!
//! Every message is one JSON object on one line, tagged by a `type` field.
//! Inbound lines are parsed envelope-first: the `type` tag is inspected
//! before the variant's fields are decoded, so an unrecognized `type` is a
//! logged no-op (forward compatibility) rather than a decode error.
//!
//! # Known inbound types
//!
//! | `type`      | Maps to                                        |
//! |-------------|------------------------------------------------|
//! | `request`   | [`InboundMessage::Request`]                    |
//! | `cancel`    | [`InboundMessage::Cancel`]                     |
//! | `heartbeat` | [`InboundMessage::Heartbeat`]                  |
//! | *(other)*   | Skipped; logged at `DEBUG`                     |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{AppError, Result};

/// Caller-assigned request identifier, unique among in-flight requests.
pub type RequestId = u64;

/// Named parameters decoded from a request's `params` object.
pub type Params = serde_json::Map<String, Value>;

/// Heartbeat message subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatKind {
    /// Liveness probe.
    Ping,
    /// Probe reply echoing the probe's timestamp.
    Pong,
}

/// Messages the server consumes (front end → server).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Method invocation expecting exactly one terminal reply.
    Request {
        /// Caller-assigned identifier for reply correlation.
        id: RequestId,
        /// Registered handler name.
        method: String,
        /// Named arguments, empty when omitted.
        params: Params,
    },
    /// Cooperative cancellation of an outstanding request.
    Cancel {
        /// Identifier of the request to cancel.
        id: RequestId,
    },
    /// Liveness probe or probe reply.
    Heartbeat {
        /// `ping` or `pong`.
        subtype: HeartbeatKind,
        /// Seconds since the Unix epoch, sampled by the sender.
        timestamp: i64,
    },
}

/// Messages the server produces (server → front end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Terminal success reply for a request.
    Response {
        /// Identifier of the completed request.
        id: RequestId,
        /// Handler result, or `{"status":"cancelled"}` for a cancelled task.
        result: Value,
    },
    /// Terminal failure reply for a request.
    Error {
        /// Identifier of the failed request.
        id: RequestId,
        /// Human-readable failure description.
        error: String,
    },
    /// Periodic liveness ping, or pong echoing an inbound ping.
    Heartbeat {
        /// `ping` or `pong`.
        subtype: HeartbeatKind,
        /// Seconds since the Unix epoch.
        timestamp: i64,
    },
    /// One-way event carrying progress or state updates; no reply expected.
    Notification {
        /// Event name (e.g. `progress`, `displayValueUpdate`).
        event: String,
        /// Event payload.
        data: Value,
    },
    /// One-way diagnostic text channel.
    Print {
        /// Diagnostic text.
        message: String,
    },
}

impl OutboundMessage {
    /// Serialize to a single-line JSON string without a trailing newline.
    ///
    /// Compact serialization never embeds a newline, so the writer can
    /// append exactly one `\n` to frame the message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if serialization fails (not expected
    /// for this message set).
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| AppError::Protocol(format!("failed to serialize message: {err}")))
    }
}

// ── Inbound envelope decoding ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RequestFields {
    id: RequestId,
    method: String,
    #[serde(default)]
    params: Params,
}

#[derive(Debug, Deserialize)]
struct CancelFields {
    id: RequestId,
}

#[derive(Debug, Deserialize)]
struct HeartbeatFields {
    subtype: HeartbeatKind,
    timestamp: i64,
}

/// Parse one inbound wire line into an [`InboundMessage`].
///
/// # Return value
///
/// - `Ok(Some(message))` — the line is a recognized, complete message.
/// - `Ok(None)` — the line carries an unrecognized `type` (silently
///   skipped; logged at `DEBUG` level).
/// - `Err(AppError::Protocol(...))` — the line is not valid JSON, lacks a
///   `type` tag, or a known type is missing a required field.
///
/// # Errors
///
/// - `AppError::Protocol("malformed json: …")` — not valid JSON.
/// - `AppError::Protocol("missing required field: …")` — recognized type
///   with an absent or ill-typed required field.
pub fn parse_inbound_line(line: &str) -> Result<Option<InboundMessage>> {
    let value: Value = serde_json::from_str(line)
        .map_err(|err| AppError::Protocol(format!("malformed json: {err}")))?;

    let Some(kind) = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return Err(AppError::Protocol(
            "missing required field: `type` tag".into(),
        ));
    };

    match kind.as_str() {
        "request" => {
            let fields: RequestFields = serde_json::from_value(value).map_err(|err| {
                AppError::Protocol(format!("missing required field: request: {err}"))
            })?;
            if fields.id == 0 {
                return Err(AppError::Protocol(
                    "missing required field: request `id` must be a positive integer".into(),
                ));
            }
            Ok(Some(InboundMessage::Request {
                id: fields.id,
                method: fields.method,
                params: fields.params,
            }))
        }
        "cancel" => {
            let fields: CancelFields = serde_json::from_value(value).map_err(|err| {
                AppError::Protocol(format!("missing required field: cancel: {err}"))
            })?;
            Ok(Some(InboundMessage::Cancel { id: fields.id }))
        }
        "heartbeat" => {
            let fields: HeartbeatFields = serde_json::from_value(value).map_err(|err| {
                AppError::Protocol(format!("missing required field: heartbeat: {err}"))
            })?;
            Ok(Some(InboundMessage::Heartbeat {
                subtype: fields.subtype,
                timestamp: fields.timestamp,
            }))
        }
        other => {
            debug!(kind = other, "skipping inbound message of unknown type");
            Ok(None)
        }
    }
}

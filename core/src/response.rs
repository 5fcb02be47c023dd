//! Response interpretation and error normalization.
//!
//! # Design
//! Status 200 is the only success. Any other status carries one of two error
//! shapes: `{"message": "..."}` or `{"errors": {key: text | [text, ...]}}`.
//! The body is decoded once into `ErrorBody` and flattened into a single
//! message. Keys containing `position` hold the field errors of one batch row
//! and are joined with `"; "`; every entry becomes one line, and the lines
//! are joined with CRLF behind a leading CRLF.

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Result, TransportError};
use crate::http::{HttpResponse, ResponseFormat};

/// Message used when a rejection carries neither `message` nor `errors`.
pub const UNKNOWN_ERROR: &str = "unknown error";

const LINE_BREAK: &str = "\r\n";
const ROW_SEPARATOR: &str = "; ";

/// A successful response. `http_code` is always 200.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    pub http_code: u16,
    pub body: T,
}

impl<T> ResponseEnvelope<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            http_code: self.http_code,
            body: f(self.body),
        }
    }
}

/// Success body in the shape its request asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(Vec<u8>),
}

impl ResponseBody {
    /// The JSON payload. Raw bytes are decoded on demand.
    pub fn into_json(self) -> Result<Value> {
        match self {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Raw(bytes) => decode_json(&bytes),
        }
    }

    /// The body bytes. A JSON payload is serialized back to text.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResponseBody::Raw(bytes) => bytes,
            ResponseBody::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// One value of the `errors` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValue {
    Text(String),
    List(Vec<String>),
}

/// Decoded error payload of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Message(String),
    /// Entries in the order the server sent them.
    FieldErrors(Vec<(String, ErrorValue)>),
    Unknown,
}

impl ErrorBody {
    /// Each field is checked on its own: a well-formed `message` wins even
    /// when `errors` has an unexpected shape, and a malformed `message`
    /// does not hide usable `errors`.
    pub fn decode(body: &[u8]) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(body) else {
            return ErrorBody::Unknown;
        };
        if let Some(Value::String(message)) = fields.remove("message") {
            return ErrorBody::Message(message);
        }
        let entries: Vec<(String, ErrorValue)> = match fields.remove("errors") {
            Some(Value::Object(errors)) => errors
                .into_iter()
                .filter_map(|(key, value)| error_value(value).map(|value| (key, value)))
                .collect(),
            _ => Vec::new(),
        };
        if entries.is_empty() {
            ErrorBody::Unknown
        } else {
            ErrorBody::FieldErrors(entries)
        }
    }

    /// Flatten into the single human-readable message.
    pub fn normalize(&self) -> String {
        match self {
            ErrorBody::Message(message) => message.clone(),
            ErrorBody::FieldErrors(entries) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| match value {
                        ErrorValue::List(items) if key.contains("position") => {
                            items.join(ROW_SEPARATOR)
                        }
                        ErrorValue::Text(text) => text.clone(),
                        // Lists under plain field keys render like row errors.
                        ErrorValue::List(items) => items.join(ROW_SEPARATOR),
                    })
                    .collect();
                format!("{LINE_BREAK}{}", lines.join(LINE_BREAK))
            }
            ErrorBody::Unknown => UNKNOWN_ERROR.to_string(),
        }
    }
}

fn error_value(value: Value) -> Option<ErrorValue> {
    match value {
        Value::String(text) => Some(ErrorValue::Text(text)),
        Value::Array(items) => Some(ErrorValue::List(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => text,
                    other => other.to_string(),
                })
                .collect(),
        )),
        Value::Null => None,
        other => Some(ErrorValue::Text(other.to_string())),
    }
}

/// Turn a response into its JSON success payload, or a normalized error.
pub fn interpret(response: HttpResponse) -> Result<ResponseEnvelope<Value>> {
    let response = accept(response)?;
    let body = decode_json(&response.body)?;
    Ok(ResponseEnvelope {
        http_code: response.status,
        body,
    })
}

/// Like `interpret`, but hands the success body back as raw bytes.
pub fn interpret_raw(response: HttpResponse) -> Result<ResponseEnvelope<Vec<u8>>> {
    let response = accept(response)?;
    Ok(ResponseEnvelope {
        http_code: response.status,
        body: response.body,
    })
}

/// Interpret a response the way its request's `format` asks for.
pub fn interpret_as(
    response: HttpResponse,
    format: ResponseFormat,
) -> Result<ResponseEnvelope<ResponseBody>> {
    match format {
        ResponseFormat::Json => Ok(interpret(response)?.map(ResponseBody::Json)),
        ResponseFormat::Raw => Ok(interpret_raw(response)?.map(ResponseBody::Raw)),
    }
}

fn decode_json(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| TransportError::MalformedResponse(e.to_string()).into())
}

fn accept(response: HttpResponse) -> Result<HttpResponse> {
    debug!(status = response.status, "interpreting response");
    if response.status == 200 {
        return Ok(response);
    }
    Err(ApiError::RemoteOperation {
        status: response.status,
        message: ErrorBody::decode(&response.body).normalize(),
    })
}

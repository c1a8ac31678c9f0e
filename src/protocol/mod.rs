//! Wire codec for callback socket calls.
//!
//! One call per connection, framed by EOF:
//!
//! ```text
//! CLASS:TYPE:PAYLOAD
//! ```
//!
//! - `CLASS` - dotted address, e.g. `logger.status` (case-folded to lowercase)
//! - `TYPE` - `string` (default, may be empty), `bool`, `int` or `json`
//! - `PAYLOAD` - everything after the second colon, colons included
//!
//! A payload starting with `{` carries a key: `{KEY}VALUE`. Examples:
//!
//! ```text
//! logger.status::Hello world!
//! common.progress.set:int:42
//! field.set.by-label:string:{Shadow Location}/etc/shadow
//! common.list.complete:bool:{disk-setup}true
//! ```
//!
//! Decoding is total: malformed input degrades to an empty or string call,
//! so handlers check [`ApiCall::data_type`] before trusting a typed getter.
//! An optional reply travels back as a single `CLASS:REPLY\n` line.

mod route;

use std::fmt;

use serde_json::Value;

pub use route::{Route, RouteScope};

/// Declared type of a call payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Plain text (default).
    #[default]
    String,
    /// `true`/`yes` (case-insensitive) or false.
    Bool,
    /// Signed integer.
    Int,
    /// JSON document.
    Json,
}

impl DataType {
    /// Parses a wire type token. Unknown or empty tokens are strings.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "json" => Self::Json,
            _ => Self::String,
        }
    }

    /// Wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload resolved once at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text; also the fallback for ints and JSON that failed to parse.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Parsed JSON.
    Json(Value),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// One decoded call from a running module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiCall {
    class: String,
    data_type: DataType,
    key: Option<String>,
    raw: String,
    payload: Payload,
}

impl ApiCall {
    /// Decodes a call out of raw bytes. Never fails.
    ///
    /// Input without two separators yields an empty call whose class is `""`.
    pub fn decode(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut tokens = text.trim().splitn(3, ':');
        let (Some(class), Some(data_type), Some(payload)) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            return Self::default();
        };

        let data_type = DataType::parse(data_type);
        let (key, raw) = split_key(payload);
        let payload = resolve(data_type, &raw);

        Self {
            class: class.to_lowercase(),
            data_type,
            key,
            raw,
            payload,
        }
    }

    /// Address of the call, lowercase.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Route of the call, if the class is part of the vocabulary.
    pub fn route(&self) -> Option<Route> {
        Route::from_class(&self.class)
    }

    /// Declared payload type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Key of a `{KEY}VALUE` payload.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Key parsed as an integer, `-1` when absent or not a number.
    pub fn key_as_int(&self) -> i64 {
        self.key
            .as_deref()
            .and_then(|k| k.trim().parse().ok())
            .unwrap_or(-1)
    }

    /// Payload text as received, whatever the declared type.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Resolved payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Payload as text; empty unless the type is `string`.
    pub fn as_str(&self) -> &str {
        match (&self.data_type, &self.payload) {
            (DataType::String, Payload::Text(s)) => s,
            _ => "",
        }
    }

    /// Payload as a boolean; `false` unless the type is `bool`.
    pub fn as_bool(&self) -> bool {
        matches!(self.payload, Payload::Bool(true))
    }

    /// Payload as an integer; `-1` unless the type is `int` and it parsed.
    pub fn as_int(&self) -> i64 {
        match self.payload {
            Payload::Int(n) => n,
            _ => -1,
        }
    }

    /// Payload as JSON; `None` unless the type is `json` and it parsed.
    pub fn as_json(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Splits a `{KEY}VALUE` payload. An unclosed `{` keeps the text as is.
fn split_key(payload: &str) -> (Option<String>, String) {
    let Some(rest) = payload.strip_prefix('{') else {
        return (None, payload.to_string());
    };
    match rest.split_once('}') {
        Some((key, value)) => {
            let key = (!key.is_empty()).then(|| key.to_string());
            (key, value.to_string())
        }
        None => (None, payload.to_string()),
    }
}

fn resolve(data_type: DataType, raw: &str) -> Payload {
    match data_type {
        DataType::String => Payload::Text(raw.to_string()),
        DataType::Bool => {
            let v = raw.trim().to_lowercase();
            Payload::Bool(v == "true" || v == "yes")
        }
        DataType::Int => raw
            .trim()
            .parse()
            .map_or_else(|_| Payload::Text(raw.to_string()), Payload::Int),
        DataType::Json => serde_json::from_str(raw)
            .map_or_else(|_| Payload::Text(raw.to_string()), Payload::Json),
    }
}

/// Encodes a call for the wire.
///
/// A value starting with `{` gets an empty key prefix so the receiver does
/// not mistake it for a key.
pub fn encode(class: &str, data_type: DataType, key: Option<&str>, value: &str) -> Vec<u8> {
    let key = match key {
        Some(k) => format!("{{{k}}}"),
        None if value.starts_with('{') => "{}".to_string(),
        None => String::new(),
    };
    format!("{class}:{data_type}:{key}{value}").into_bytes()
}

/// Encodes a plain string call.
pub fn encode_str(class: &str, value: &str) -> Vec<u8> {
    encode(class, DataType::String, None, value)
}

/// Formats the reply line written back on a connection.
pub fn reply_line(class: &str, reply: &str) -> String {
    format!("{class}:{reply}\n")
}

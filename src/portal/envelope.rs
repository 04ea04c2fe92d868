//! Command envelope extraction
//!
//! Entry-path bodies are JSON objects of the form
//! `{"command": "<string>", ...op-specific fields}`. Only the command field is
//! interpreted here; the rest is handed to the resolved handler untouched.

use serde_json::{Map, Value};

use super::buffer::BufferedBody;
use super::error::MalformedCommandError;

/// Parsed body of an entry-path request
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    /// Command string exactly as sent
    pub command: String,
    /// Every other top-level field
    pub payload: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn parse(bytes: &[u8], field: &str) -> Result<Self, MalformedCommandError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(MalformedCommandError::InvalidJson)?;
        let Value::Object(mut payload) = value else {
            return Err(MalformedCommandError::NotAnObject);
        };

        let command = match payload.remove(field) {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(MalformedCommandError::NotAString {
                    field: field.to_string(),
                })
            }
            None => {
                return Err(MalformedCommandError::MissingField {
                    field: field.to_string(),
                })
            }
        };
        if command.trim().is_empty() {
            return Err(MalformedCommandError::Empty {
                field: field.to_string(),
            });
        }

        Ok(Self { command, payload })
    }

    pub fn from_body(body: &BufferedBody, field: &str) -> Result<Self, MalformedCommandError> {
        Self::parse(body.as_bytes(), field)
    }
}

//! Portal error types
//!
//! Buffer and envelope failures are handled per request (they become 4xx
//! responses). Registry build failures are fatal at startup.

use thiserror::Error;

/// The original body stream could not be drained into memory.
#[derive(Debug, Error)]
pub enum BodyReadError {
    /// The underlying stream failed (I/O error, truncated connection).
    #[error("failed to read request body: {0}")]
    Stream(String),

    /// The body exceeded the configured buffer limit.
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
}

/// The buffered body is not a usable command envelope.
#[derive(Debug, Error)]
pub enum MalformedCommandError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("envelope must be a JSON object")]
    NotAnObject,

    #[error("envelope has no '{field}' field")]
    MissingField { field: String },

    #[error("envelope field '{field}' must be a string")]
    NotAString { field: String },

    #[error("envelope field '{field}' is empty")]
    Empty { field: String },
}

/// Why the dispatcher declined to pick a handler.
///
/// `NoMatch` is the documented soft outcome: the request falls through to
/// normal routing. `Malformed` surfaces as a client error.
#[derive(Debug, Error)]
pub enum Decline {
    #[error("request path is not the shared entry path")]
    NotEntryPath,

    #[error(transparent)]
    Malformed(#[from] MalformedCommandError),

    #[error("no handler route matches command '{command}'")]
    NoMatch { command: String },
}

/// The command registry could not be built from the registered handlers.
#[derive(Debug, Error)]
pub enum RegistryBuildError {
    /// A declared route cannot be normalized into a dispatch key.
    #[error("handler '{handler}' declares invalid route '{route}': {reason}")]
    InvalidRoute {
        handler: String,
        route: String,
        reason: &'static str,
    },

    /// Two POST routes normalize to the same key.
    #[error("route '{route}' is declared by both '{first}' and '{second}'")]
    DuplicateRoute {
        route: String,
        first: String,
        second: String,
    },

    /// A command would match routes of two different entries.
    #[error("command '{command}' would match both '{first}' and '{second}'")]
    AmbiguousCommand {
        command: String,
        first: String,
        second: String,
    },

    /// Two handlers were registered under the same id.
    #[error("handler '{id}' is already registered")]
    DuplicateHandler { id: String },
}

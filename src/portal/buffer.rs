//! Rewindable request buffer
//!
//! Drains an entry-path request body into memory exactly once and hands back
//! an equivalent request whose body can be read any number of times.

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use std::io::Cursor;

use super::error::BodyReadError;
use super::normalize::is_entry_path;

/// Owned copy of a request body.
///
/// Cloning is cheap (reference counted); every reader starts at offset zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedBody {
    bytes: Bytes,
}

impl BufferedBody {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Fresh `Read + BufRead` cursor over the captured bytes
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.bytes.clone())
    }

    /// Fresh hyper body over the captured bytes
    pub fn stream(&self) -> Full<Bytes> {
        Full::new(self.bytes.clone())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body handed to a handler.
///
/// Commands and ordinary requests arrive buffered. Multipart uploads arrive
/// as the original stream, unread and uncapped.
pub enum PortalBody {
    Buffered(BufferedBody),
    Streaming(UnsyncBoxBody<Bytes, BoxError>),
}

impl PortalBody {
    pub fn streaming<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Streaming(body.map_err(Into::into).boxed_unsync())
    }

    pub fn buffered(&self) -> Option<&BufferedBody> {
        match self {
            Self::Buffered(body) => Some(body),
            Self::Streaming(_) => None,
        }
    }

    /// Consume as a stream: a fresh one over buffered bytes, or the upload
    /// stream as received
    pub fn into_stream(self) -> UnsyncBoxBody<Bytes, BoxError> {
        match self {
            Self::Buffered(body) => body
                .stream()
                .map_err(|never| -> BoxError { match never {} })
                .boxed_unsync(),
            Self::Streaming(stream) => stream,
        }
    }
}

/// Outcome of [`RequestBuffer::capture`]
#[derive(Debug)]
pub enum Captured<B> {
    /// Entry-path request with its body captured in memory
    Buffered(Request<BufferedBody>),
    /// Request left untouched (other path, or multipart upload)
    Passthrough(Request<B>),
}

/// Buffering policy for the shared entry path
#[derive(Debug, Clone)]
pub struct RequestBuffer {
    entry_path: String,
    max_body_size: usize,
}

impl RequestBuffer {
    pub fn new(entry_path: impl Into<String>, max_body_size: usize) -> Self {
        Self {
            entry_path: entry_path.into(),
            max_body_size,
        }
    }

    pub const fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Capture the body of an entry-path request.
    ///
    /// Requests to other paths and multipart uploads come back as
    /// [`Captured::Passthrough`] without their body being touched. On a read
    /// failure the partially read bytes are dropped and the request must be
    /// rejected.
    pub async fn capture<B>(&self, req: Request<B>) -> Result<Captured<B>, BodyReadError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if !is_entry_path(req.uri().path(), &self.entry_path) || is_multipart(&req) {
            return Ok(Captured::Passthrough(req));
        }

        let (parts, body) = req.into_parts();
        let bytes = read_limited(body, self.max_body_size).await?;
        Ok(Captured::Buffered(Request::from_parts(
            parts,
            BufferedBody::new(bytes),
        )))
    }
}

/// Drain `body` into memory, failing once more than `limit` bytes arrive
pub async fn read_limited<B>(body: B, limit: usize) -> Result<Bytes, BodyReadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyReadError::TooLarge { limit })
        }
        Err(err) => Err(BodyReadError::Stream(err.to_string())),
    }
}

/// True when the request carries a `multipart/*` body
pub fn is_multipart<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .get(..10)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
        })
}

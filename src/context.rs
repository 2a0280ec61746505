//! Request-side surface consumed by the storage core.

use std::{
    fmt,
    io::{self, Read},
};

use http::{header, HeaderMap};
use tracing::debug;

use crate::{StorageItem, StorageItemError, StorageItemFactory};

/// Transport-neutral view of an incoming request body.
///
/// Any transport offering a byte stream plus length, content type and
/// character encoding can drive the storage core through this trait.
pub trait RequestContext {
    /// Body reader type.
    type Body: Read;

    /// Returns the declared content length in bytes, if known.
    fn content_length(&self) -> Option<u64>;

    /// Returns the declared content length when it fits in an `i32`.
    #[deprecated(note = "use `content_length` instead")]
    fn legacy_content_length(&self) -> Option<i32> {
        self.content_length()
            .and_then(|length| i32::try_from(length).ok())
    }

    /// Returns the request character encoding, if declared.
    fn character_encoding(&self) -> Option<String>;

    /// Returns the raw `Content-Type` value, if present.
    fn content_type(&self) -> Option<&str>;

    /// Takes the request body stream.
    fn input_stream(&mut self) -> io::Result<Self::Body>;
}

/// [`RequestContext`] over `http` request headers and a blocking body reader.
#[derive(Debug)]
pub struct HttpRequestContext<R> {
    headers: HeaderMap,
    declared_length: Option<u64>,
    body: Option<R>,
}

impl<R: Read> HttpRequestContext<R> {
    /// Creates a context from request headers and a body reader.
    pub fn new(headers: HeaderMap, body: R) -> Self {
        Self {
            headers,
            declared_length: None,
            body: Some(body),
        }
    }

    /// Creates a context from an `http::Request` whose body is a reader.
    pub fn from_request(request: http::Request<R>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.headers, body)
    }

    /// Sets the transport-level length used when `Content-Length` is missing or unparsable.
    pub fn with_declared_length(mut self, length: u64) -> Self {
        self.declared_length = Some(length);
        self
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl<R: Read> RequestContext for HttpRequestContext<R> {
    type Body = R;

    fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .or(self.declared_length)
    }

    fn character_encoding(&self) -> Option<String> {
        let parsed = self.content_type()?.parse::<mime::Mime>().ok()?;
        parsed
            .get_param(mime::CHARSET)
            .map(|charset| charset.as_str().to_owned())
    }

    fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    fn input_stream(&mut self) -> io::Result<R> {
        self.body
            .take()
            .ok_or_else(|| io::Error::other("request body already taken"))
    }
}

impl<R: Read> fmt::Display for HttpRequestContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self
            .content_length()
            .map_or_else(|| "unknown".to_owned(), |length| length.to_string());
        write!(
            f,
            "ContentLength={length}, ContentType={}",
            self.content_type().unwrap_or("none")
        )
    }
}

/// Streams a whole request body into a new finalized item.
///
/// A declared length above the factory's `max_item_size` is rejected before
/// the body is read. On any failure the partially written item is disposed.
pub fn store_request_body<C: RequestContext>(
    factory: &StorageItemFactory,
    field_name: &str,
    context: &mut C,
) -> Result<StorageItem, StorageItemError> {
    if let (Some(declared), Some(max_item_size)) =
        (context.content_length(), factory.config().max_item_size)
    {
        if declared > max_item_size {
            return Err(StorageItemError::ItemSizeLimitExceeded {
                field: field_name.to_owned(),
                max_item_size,
            });
        }
    }

    let content_type = context.content_type().unwrap_or_default().to_owned();
    let mut item = factory.create_item(field_name, content_type, false, None);
    let body = context.input_stream()?;
    {
        let mut sink = item.open_write_sink()?;
        sink.copy_from(body)?;
        sink.close()?;
    }

    debug!(
        field = field_name,
        size = item.size(),
        in_memory = item.is_in_memory(),
        "stored request body"
    );
    Ok(item)
}

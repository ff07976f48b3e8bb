//! Construction of requests, URIs and streams.

use crate::{
    error::InvalidArgumentError,
    message::Request,
    stream::{ByteStream, IntoByteStream, StreamData},
    uri::Uri,
};

/// Builds the value objects a client sends.
pub trait RequestFactory: Send + Sync {
    /// Returns a new empty request: `GET`, empty URI, no headers, empty body.
    fn create_request(&self) -> Request {
        Request::default()
    }

    /// Parses `uri` into a [`Uri`], or returns the empty URI when no string is given.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidArgumentError`] if the string is not a valid URI reference.
    fn create_uri(&self, uri: Option<&str>) -> Result<Uri, InvalidArgumentError> {
        uri.map_or_else(|| Ok(Uri::default()), Uri::parse)
    }

    /// Wraps `data` into a readable [`ByteStream`].
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidArgumentError`] if `data` cannot be coerced into bytes.
    fn create_stream(&self, data: StreamData) -> Result<ByteStream, InvalidArgumentError> {
        data.into_byte_stream()
    }
}

/// The factory used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestFactory;

impl RequestFactory for DefaultRequestFactory {}

//! Request and response value types.
//!
//! Both are immutable once constructed: every `with_*` method consumes the
//! value and returns a new one. They are cheap to clone because their bodies
//! are reference counted.

use bon::Builder;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header::IntoHeaderName};

use crate::{error::InvalidArgumentError, stream::ByteStream, uri::Uri};

/// An outgoing HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: ByteStream,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            ..Self::default()
        }
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the target URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the headers, in insertion order.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &ByteStream {
        &self.body
    }

    /// Returns a copy with the given method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Returns a copy with the given URI.
    #[must_use]
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Returns a copy where `name` has exactly the given value.
    #[must_use]
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a copy with `value` appended to the values of `name`.
    #[must_use]
    pub fn with_added_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns a copy without any value for `name`.
    #[must_use]
    pub fn without_header(mut self, name: &HeaderName) -> Self {
        self.headers.remove(name);
        self
    }

    /// Returns a copy with all headers replaced.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns a copy with the given body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<ByteStream>) -> Self {
        self.body = body.into();
        self
    }

    /// Converts into an [`http::Request`] for transports built on the `http` crate.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError::UnsendableUri`] if the URI cannot be
    /// represented as an [`http::Uri`].
    pub fn into_http(self) -> Result<http::Request<Bytes>, InvalidArgumentError> {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.method = self.method;
        parts.uri = self.uri.to_http_uri()?;
        parts.headers = self.headers;
        Ok(http::Request::from_parts(parts, self.body.into_bytes()))
    }
}

/// A response produced by a transport.
#[derive(Debug, Clone, Builder)]
pub struct Response {
    /// The status code.
    #[builder(default = StatusCode::OK)]
    status: StatusCode,
    /// The response headers.
    #[builder(default)]
    headers: HeaderMap,
    /// The response body.
    #[builder(default, into)]
    body: ByteStream,
}

impl Response {
    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &ByteStream {
        &self.body
    }

    /// Consumes the response and returns its body.
    #[must_use]
    pub fn into_body(self) -> ByteStream {
        self.body
    }

    /// Returns a copy with the given status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Returns a copy with `value` appended to the values of `name`.
    #[must_use]
    pub fn with_added_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns a copy with the given body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<ByteStream>) -> Self {
        self.body = body.into();
        self
    }
}

impl From<http::Response<Bytes>> for Response {
    fn from(value: http::Response<Bytes>) -> Self {
        let (parts, body) = value.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body: body.into(),
        }
    }
}

impl From<Response> for http::Response<Bytes> {
    fn from(value: Response) -> Self {
        let (mut parts, ()) = http::Response::new(()).into_parts();
        parts.status = value.status;
        parts.headers = value.headers;
        http::Response::from_parts(parts, value.body.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, CONTENT_TYPE};

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn modifications_produce_new_values() {
        let original = Request::new(Method::GET, uri("http://example.com/"));
        let changed = original
            .clone()
            .with_method(Method::POST)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_body("hello");

        assert_eq!(original.method(), Method::GET);
        assert!(original.headers().is_empty());
        assert!(original.body().is_empty());

        assert_eq!(changed.method(), Method::POST);
        assert_eq!(changed.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(changed.body().as_bytes(), b"hello");
    }

    #[test]
    fn headers_keep_multiple_values_in_order() {
        let request = Request::default()
            .with_added_header(ACCEPT, HeaderValue::from_static("text/html"))
            .with_added_header(ACCEPT, HeaderValue::from_static("application/json"));

        let values: Vec<_> = request.headers().get_all(ACCEPT).iter().collect();
        assert_eq!(values, ["text/html", "application/json"]);

        let request = request.without_header(&ACCEPT);
        assert!(request.headers().get(ACCEPT).is_none());
    }

    #[test]
    fn converts_into_http_request() {
        let request = Request::new(Method::PUT, uri("https://example.com/x?y=1#frag"))
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body("{}");

        let http_request = request.into_http().unwrap();
        assert_eq!(http_request.method(), Method::PUT);
        assert_eq!(http_request.uri(), "https://example.com/x?y=1");
        assert_eq!(http_request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(http_request.body().as_ref(), b"{}");
    }

    #[test]
    fn relative_request_cannot_be_converted() {
        let request = Request::new(Method::GET, uri("a/b"));
        assert!(matches!(
            request.into_http(),
            Err(InvalidArgumentError::UnsendableUri { .. })
        ));
    }

    #[test]
    fn response_builder_defaults() {
        let response = Response::builder().build();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());

        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body("missing")
            .build();
        let http_response: http::Response<Bytes> = response.into();
        assert_eq!(http_response.status(), StatusCode::NOT_FOUND);
        assert_eq!(http_response.body().as_ref(), b"missing");
    }
}

//! Per-request options.
//!
//! [`RequestOptions`] replaces an untyped options bag with the keys every
//! client honours, plus two passthrough paths for transport-specific settings:
//! typed values in [`http::Extensions`], and unrecognised keys collected in
//! [`RequestOptions::vendor`] when options are deserialized from a map.

use bon::Builder;
use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use snafu::prelude::*;

use crate::{
    error::{
        InvalidArgumentError, InvalidHeaderLineSnafu, InvalidHeaderNameSnafu,
        InvalidHeaderValueSnafu,
    },
    message::Request,
    stream::ByteStream,
};

/// Options accepted by every client operation.
///
/// Options never modify a request in place; [`RequestOptions::apply`] returns a new one.
#[derive(Debug, Default, Builder, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Header lines of the form `Name: value`, appended in order.
    #[builder(default, with = |lines: impl IntoIterator<Item = impl Into<String>>| {
        lines.into_iter().map(Into::into).collect()
    })]
    pub headers: Vec<String>,

    /// Replaces the request body when set.
    #[builder(into)]
    pub body: Option<ByteStream>,

    /// Unrecognised keys, handed to the transport as [`VendorOptions`].
    #[serde(flatten)]
    #[builder(default)]
    pub vendor: serde_json::Map<String, serde_json::Value>,

    /// Typed transport-specific settings.
    #[serde(skip)]
    #[builder(default)]
    pub extensions: http::Extensions,
}

impl RequestOptions {
    /// Applies the headers and body to `request`.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidArgumentError`] if a header line is malformed.
    pub fn apply(&self, request: Request) -> Result<Request, InvalidArgumentError> {
        let mut request = request;
        for line in &self.headers {
            let (name, value) = parse_header_line(line)?;
            request = request.with_added_header(name, value);
        }
        if let Some(body) = &self.body {
            request = request.with_body(body.clone());
        }
        Ok(request)
    }

    /// Returns the extensions handed to the transport.
    ///
    /// A non-empty [`RequestOptions::vendor`] map is included as [`VendorOptions`].
    #[must_use]
    pub fn into_extensions(self) -> http::Extensions {
        let mut extensions = self.extensions;
        if !self.vendor.is_empty() {
            extensions.insert(VendorOptions(self.vendor));
        }
        extensions
    }
}

/// Options keys no client recognises, as found in a deserialized options map.
///
/// Transports read them from the extensions they are given:
///
/// ```
/// # use http_interop::options::{RequestOptions, VendorOptions};
/// let options: RequestOptions = serde_json::from_str(r#"{"timeout": 5}"#).unwrap();
/// let extensions = options.into_extensions();
/// let vendor = extensions.get::<VendorOptions>().unwrap();
/// assert_eq!(vendor.get("timeout"), Some(&serde_json::json!(5)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorOptions(pub serde_json::Map<String, serde_json::Value>);

impl VendorOptions {
    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

/// Parses a header line like `Content-Type: application/json`.
pub(crate) fn parse_header_line(
    line: &str,
) -> Result<(HeaderName, HeaderValue), InvalidArgumentError> {
    let (name, value) = line
        .split_once(':')
        .context(InvalidHeaderLineSnafu { line })?;
    let name = name.trim();
    ensure!(!name.is_empty(), InvalidHeaderLineSnafu { line });

    let header_name = HeaderName::from_bytes(name.as_bytes())
        .context(InvalidHeaderNameSnafu { name })?;
    let header_value =
        HeaderValue::from_str(value.trim()).context(InvalidHeaderValueSnafu { name })?;

    Ok((header_name, header_value))
}

//! Request and response bodies.
//!
//! A [`ByteStream`] is an immutable, cheaply cloneable body. Values are
//! coerced into one through [`IntoByteStream`]; readers are drained eagerly so
//! that requests and responses stay plain values that can be shared between
//! promise continuations.

use std::fmt;
use std::io::{Cursor, Read};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{InvalidArgumentError, UncoercibleStreamSnafu, UnreadableStreamSnafu};

/// An immutable sequence of bytes used as a message body.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteStream(Bytes);

impl ByteStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of bytes in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the stream has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the contents as [`Bytes`] without copying.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Consumes the stream and returns its [`Bytes`].
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Returns the contents as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Returns a reader positioned at the start of the stream.
    #[must_use]
    pub fn reader(&self) -> impl Read + use<> {
        Cursor::new(self.0.clone())
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream").field("len", &self.0.len()).finish()
    }
}

impl From<Bytes> for ByteStream {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<Vec<u8>> for ByteStream {
    fn from(value: Vec<u8>) -> Self {
        Self(value.into())
    }
}

impl From<String> for ByteStream {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for ByteStream {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<&[u8]> for ByteStream {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl From<ByteStream> for Bytes {
    fn from(value: ByteStream) -> Self {
        value.0
    }
}

impl Serialize for ByteStream {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(s) => serializer.serialize_str(s),
            Err(_) => serializer.serialize_bytes(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ByteStream {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer)?
            .into_byte_stream()
            .map_err(serde::de::Error::custom)
    }
}

/// Adapts any [`Read`] implementation for [`IntoByteStream`].
///
/// The reader is drained when the stream is created.
#[derive(Debug)]
pub struct Reader<R>(pub R);

/// Conversion trait for data that can be turned into a [`ByteStream`].
pub trait IntoByteStream {
    /// Attempts to convert this value into a [`ByteStream`].
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidArgumentError`] if the data has no byte representation.
    fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError>;
}

impl IntoByteStream for ByteStream {
    fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError> {
        Ok(self)
    }
}

macro_rules! infallible_into_byte_stream {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoByteStream for $ty {
                fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError> {
                    Ok(ByteStream::from(self))
                }
            }
        )*
    };
}

infallible_into_byte_stream!(Bytes, Vec<u8>, String, &str, &[u8]);

impl<R: Read> IntoByteStream for Reader<R> {
    fn into_byte_stream(mut self) -> Result<ByteStream, InvalidArgumentError> {
        let mut buf = Vec::new();
        self.0.read_to_end(&mut buf).context(UnreadableStreamSnafu)?;
        Ok(buf.into())
    }
}

/// Scalars are stringified and `null` is empty. Arrays and objects have no
/// canonical byte form and are rejected.
impl IntoByteStream for &serde_json::Value {
    fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError> {
        use serde_json::Value;

        match self {
            Value::Null => Ok(ByteStream::empty()),
            Value::Bool(b) => Ok(if *b { "1" } else { "" }.into()),
            Value::Number(n) => Ok(n.to_string().into()),
            Value::String(s) => Ok(s.as_str().into()),
            Value::Array(_) => UncoercibleStreamSnafu { kind: "an array" }.fail(),
            Value::Object(_) => UncoercibleStreamSnafu { kind: "an object" }.fail(),
        }
    }
}

impl IntoByteStream for serde_json::Value {
    fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError> {
        match self {
            serde_json::Value::String(s) => Ok(s.into()),
            other => (&other).into_byte_stream(),
        }
    }
}

/// Data accepted by [`RequestFactory::create_stream`](crate::factory::RequestFactory::create_stream).
///
/// Built with `From` from the same inputs [`IntoByteStream`] accepts, so that
/// factories stay usable as trait objects.
pub enum StreamData {
    /// Bytes already in memory.
    Bytes(ByteStream),
    /// A JSON value, coerced like [`IntoByteStream`] for `serde_json::Value`.
    Json(serde_json::Value),
    /// A reader, drained when the stream is created.
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for StreamData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

macro_rules! stream_data_from_bytes {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StreamData {
                fn from(value: $ty) -> Self {
                    Self::Bytes(value.into())
                }
            }
        )*
    };
}

stream_data_from_bytes!(ByteStream, Bytes, Vec<u8>, String, &str, &[u8]);

impl From<serde_json::Value> for StreamData {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<R: Read + Send + 'static> From<Reader<R>> for StreamData {
    fn from(Reader(reader): Reader<R>) -> Self {
        Self::Reader(Box::new(reader))
    }
}

impl IntoByteStream for StreamData {
    fn into_byte_stream(self) -> Result<ByteStream, InvalidArgumentError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Json(value) => value.into_byte_stream(),
            Self::Reader(reader) => Reader(reader).into_byte_stream(),
        }
    }
}

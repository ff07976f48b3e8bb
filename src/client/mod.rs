//! Client contracts.
//!
//! The three capabilities are separate traits so that each can be implemented
//! and mocked on its own:
//!
//! - [`SyncClient`] sends a request and blocks until the response arrives.
//! - [`AsyncClient`] returns a [`Promise`] immediately and settles it later.
//! - [`SimpleClient`] builds and sends a request from a method and a URI.
//!
//! [`Client`] implements all three on top of a transport.

mod dispatch;

use http::Method;
use snafu::ResultExt as _;

pub use dispatch::{Client, NoRuntimeError};

use crate::{
    error::{ClientError, InvalidArgumentError, InvalidMethodSnafu},
    factory::RequestFactory,
    message::{Request, Response},
    options::RequestOptions,
    promise::Promise,
    uri::{IntoUri, Uri},
};

/// Sends requests synchronously.
pub trait SyncClient {
    /// The factory behind [`SyncClient::create_request`] and [`SyncClient::create_uri`].
    type Factory: RequestFactory + ?Sized;

    /// Returns the request factory.
    fn factory(&self) -> &Self::Factory;

    /// Sends `request` and blocks until a response or a transport failure.
    ///
    /// The request is sent once; retrying is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] if the options cannot be applied,
    /// or [`ClientError::Transport`] if the transport fails.
    fn send(&self, request: Request, options: RequestOptions) -> Result<Response, ClientError>;

    /// Returns a new empty request.
    fn create_request(&self) -> Request {
        self.factory().create_request()
    }

    /// Parses `uri`, or returns the empty URI.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidArgumentError`] if the string is not a valid URI reference.
    fn create_uri(&self, uri: Option<&str>) -> Result<Uri, InvalidArgumentError> {
        self.factory().create_uri(uri)
    }
}

/// Sends requests without blocking the caller.
pub trait AsyncClient {
    /// Hands `request` to the transport and returns a promise for the response.
    ///
    /// Failures, including invalid options, reject the promise rather than
    /// being returned directly. Cancelling the promise abandons the request.
    fn send_async(&self, request: Request, options: RequestOptions)
    -> Promise<Response, ClientError>;

    /// Builds a request from `method` and `uri` and sends it with [`AsyncClient::send_async`].
    fn request_async<M, U>(
        &self,
        method: M,
        uri: U,
        options: RequestOptions,
    ) -> Promise<Response, ClientError>
    where
        Self: Sized,
        M: TryInto<Method>,
        M::Error: Into<http::Error>,
        U: IntoUri;
}

/// Sends a request described by a method and a URI, blocking for the response.
///
/// This is a convenience over [`SyncClient`], not a separate execution path.
pub trait SimpleClient {
    /// Builds a request from `method` and `uri` and sends it.
    ///
    /// The `headers` and `body` options are always honoured.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] if the method, URI or options are
    /// invalid, or [`ClientError::Transport`] if the transport fails.
    fn request<M, U>(
        &self,
        method: M,
        uri: U,
        options: RequestOptions,
    ) -> Result<Response, ClientError>
    where
        M: TryInto<Method>,
        M::Error: Into<http::Error>,
        U: IntoUri;
}

impl<C: SyncClient> SimpleClient for C {
    fn request<M, U>(
        &self,
        method: M,
        uri: U,
        options: RequestOptions,
    ) -> Result<Response, ClientError>
    where
        M: TryInto<Method>,
        M::Error: Into<http::Error>,
        U: IntoUri,
    {
        let request = build_request(self.factory(), method, uri)?;
        self.send(request, options)
    }
}

/// Builds a request through `factory` from a loosely typed method and URI.
pub(crate) fn build_request<F, M, U>(
    factory: &F,
    method: M,
    uri: U,
) -> Result<Request, InvalidArgumentError>
where
    F: RequestFactory + ?Sized,
    M: TryInto<Method>,
    M::Error: Into<http::Error>,
    U: IntoUri,
{
    let method = method
        .try_into()
        .map_err(Into::<http::Error>::into)
        .context(InvalidMethodSnafu)?;
    let uri = uri.into_uri().map_err(Into::<InvalidArgumentError>::into)?;
    Ok(factory.create_request().with_method(method).with_uri(uri))
}

//! Client-agnostic HTTP contracts.
//!
//! Application code depends on the [`SyncClient`], [`AsyncClient`] and
//! [`SimpleClient`] traits and builds messages through a [`RequestFactory`];
//! the network work is done by whichever [`transport`] is plugged into
//! [`Client`]. Asynchronous sends return a [`Promise`].

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
mod error;
pub mod factory;
pub mod message;
pub mod options;
pub mod prelude;
pub mod promise;
pub mod stream;
pub mod transport;
pub mod uri;

pub use client::{AsyncClient, Client, SimpleClient, SyncClient};
pub use error::{ClientError, Error, InvalidArgumentError, SharedError};
pub use factory::{DefaultRequestFactory, RequestFactory};
pub use message::{Request, Response};
pub use options::RequestOptions;
pub use promise::{Promise, Resolver};
pub use stream::ByteStream;
pub use uri::Uri;

/// Documentation
pub mod _documentation {
    #[doc = include_str!("../README.md")]
    mod readme {}
    #[doc = include_str!("../CHANGELOG.md")]
    pub mod changelog {}
}

pub use bytes::Bytes;

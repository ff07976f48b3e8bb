use std::fmt;
use std::sync::Arc;

use bon::bon;
use http::{Extensions, HeaderMap, Method};
use snafu::Snafu;
use tokio::runtime::Handle;

use super::{AsyncClient, SyncClient, build_request};
use crate::{
    error::{ClientError, InvalidArgumentError},
    factory::{DefaultRequestFactory, RequestFactory},
    message::{Request, Response},
    options::RequestOptions,
    promise::{Promise, Resolver, Scheduler, ThreadScheduler},
    transport::{AsyncTransport, BlockingTransport},
    uri::IntoUri,
};

/// No Tokio runtime was configured or available when sending asynchronously.
#[derive(Debug, Snafu)]
#[snafu(display("No async runtime available to drive the transport"))]
pub struct NoRuntimeError;

impl crate::Error for NoRuntimeError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A client dispatching to a transport.
///
/// `Client` implements [`SyncClient`] when the transport implements
/// [`BlockingTransport`], and [`AsyncClient`] when it implements
/// [`AsyncTransport`]. [`SimpleClient`](super::SimpleClient) comes with
/// [`SyncClient`].
pub struct Client<T> {
    transport: Arc<T>,
    factory: Arc<dyn RequestFactory>,
    default_headers: HeaderMap,
    runtime: Option<Handle>,
}

#[bon]
impl<T> Client<T> {
    /// Creates a client around `transport`.
    ///
    /// # Arguments
    ///
    /// * `transport`: The collaborator performing network I/O.
    /// * `factory`: Builds requests and URIs. Defaults to [`DefaultRequestFactory`].
    /// * `default_headers`: Added to every request that does not already set
    ///   the same header name.
    /// * `runtime`: Drives asynchronous sends. Defaults to the runtime current
    ///   at the time of each send.
    #[builder]
    pub fn new(
        #[builder(start_fn)] transport: T,
        #[builder(default = Arc::new(DefaultRequestFactory))] factory: Arc<dyn RequestFactory>,
        #[builder(default)] default_headers: HeaderMap,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            factory,
            default_headers,
            runtime,
        }
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the request factory.
    #[must_use]
    pub fn request_factory(&self) -> &dyn RequestFactory {
        &*self.factory
    }

    /// Applies options, then default headers for names the request does not set.
    fn prepare(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Result<(Request, Extensions), InvalidArgumentError> {
        let mut request = options.apply(request)?;
        let extensions = options.into_extensions();
        for name in self.default_headers.keys() {
            if request.headers().contains_key(name) {
                continue;
            }
            for value in self.default_headers.get_all(name) {
                request = request.with_added_header(name.clone(), value.clone());
            }
        }
        Ok((request, extensions))
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        match self.runtime() {
            Some(handle) => Arc::new(handle),
            None => Arc::new(ThreadScheduler),
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &std::any::type_name::<T>())
            .field("default_headers", &self.default_headers)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl<T: BlockingTransport> SyncClient for Client<T> {
    type Factory = dyn RequestFactory;

    fn factory(&self) -> &Self::Factory {
        &*self.factory
    }

    fn send(&self, request: Request, options: RequestOptions) -> Result<Response, ClientError> {
        let (request, extensions) = self.prepare(request, options)?;
        let method = request.method().clone();
        let uri = request.uri().to_string();

        tracing::debug!(%method, %uri, "sending request");
        match self.transport.execute_blocking(request, &extensions) {
            Ok(response) => {
                tracing::debug!(%method, %uri, status = %response.status(), "received response");
                Ok(response)
            }
            Err(error) => {
                tracing::warn!(%method, %uri, %error, "transport failed");
                Err(ClientError::transport(error))
            }
        }
    }
}

impl<T: AsyncTransport> AsyncClient for Client<T> {
    fn send_async(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Promise<Response, ClientError> {
        let Some(runtime) = self.runtime() else {
            tracing::warn!("cannot send asynchronously without a runtime");
            return Promise::rejected(
                Arc::new(ThreadScheduler),
                ClientError::transport(NoRuntimeError),
            );
        };
        let scheduler: Arc<dyn Scheduler> = Arc::new(runtime.clone());

        let (request, extensions) = match self.prepare(request, options) {
            Ok(prepared) => prepared,
            Err(error) => return Promise::rejected(scheduler, error.into()),
        };
        let method = request.method().clone();
        let uri = request.uri().to_string();

        let (promise, resolver) = Promise::pending(scheduler);
        let transport = Arc::clone(&self.transport);
        let settle = SettleOnDrop(resolver.clone());

        tracing::debug!(%method, %uri, "dispatching request");
        let task = runtime.spawn(async move {
            match transport.execute(request, extensions).await {
                Ok(response) => {
                    tracing::debug!(%method, %uri, status = %response.status(), "received response");
                    settle.0.resolve(response);
                }
                Err(error) => {
                    tracing::warn!(%method, %uri, %error, "transport failed");
                    settle.0.reject(ClientError::transport(error));
                }
            }
        });

        let abort = task.abort_handle();
        resolver.on_cancel(move || {
            tracing::trace!("aborting transport task");
            abort.abort();
        });

        promise
    }

    fn request_async<M, U>(
        &self,
        method: M,
        uri: U,
        options: RequestOptions,
    ) -> Promise<Response, ClientError>
    where
        M: TryInto<Method>,
        M::Error: Into<http::Error>,
        U: IntoUri,
    {
        match build_request(&*self.factory, method, uri) {
            Ok(request) => self.send_async(request, options),
            Err(error) => Promise::rejected(self.scheduler(), error.into()),
        }
    }
}

/// Rejects the promise with [`ClientError::Cancelled`] if the transport task
/// ends (abort or panic) without settling it.
struct SettleOnDrop(Resolver<Response, ClientError>);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        if self.0.is_pending() {
            self.0.reject(ClientError::Cancelled);
        }
    }
}

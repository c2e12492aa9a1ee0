//! Handler trait and type erasure.
//!
//! The router holds handlers of different concrete types in one table, so
//! each is wrapped once at registration time into a [`BoxedHandler`]:
//!
//! ```text
//! async fn show(req: Request) -> Response { … }    ← application code
//!        ↓ routes.on(Method::GET, "/invoices/{id}", show)
//! Arc::new(FnHandler(show))                       ← BoxedHandler
//!        ↓ last stage of the gateway calls next.run(req)
//! Box::pin(async { show(req).await.into_response() })
//! ```
//!
//! The endpoint is the tail of every gateway chain: it runs only after every
//! stage configured for the route's gateway has let the request through.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the public [`BoxedHandler`]
/// alias used by [`Pipeline::dispatch`](crate::middleware::Pipeline::dispatch).
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler: any
/// `async fn name(req: Request) -> impl IntoResponse`.
///
/// Sealed; only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Erases a handler so it can be passed to [`Pipeline::dispatch`](crate::middleware::Pipeline::dispatch)
/// without going through a router.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    handler.into_boxed_handler()
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

//! Tower integration.
//!
//! [`RpcLayer`] puts a [`Dispatcher`] in front of any service. Requests no
//! route matches fall through to the inner service unchanged.
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use pathrpc_axum::{Route, RouteError, RouterBuilder};
//!
//! let dispatcher = RouterBuilder::new()
//!     .prefix("/api")
//!     .route(Route::get("/ping").json(|_: (), _: (), _ctx| async move {
//!         Ok::<_, RouteError>("pong")
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let app: Router = Router::new()
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(dispatcher.layer());
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tower::{Layer, Service, ServiceExt};

use crate::dispatch::Dispatcher;

/// Layer serving a dispatcher's routes before the inner service.
#[derive(Clone, Debug)]
pub struct RpcLayer {
    dispatcher: Dispatcher,
}

impl RpcLayer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl<S> Layer<S> for RpcLayer {
    type Service = RpcService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcService {
            dispatcher: self.dispatcher.clone(),
            inner,
        }
    }
}

/// Service produced by [`RpcLayer`].
#[derive(Clone, Debug)]
pub struct RpcService<S> {
    dispatcher: Dispatcher,
    inner: S,
}

impl<S> Service<Request<Body>> for RpcService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        // The clone may not be ready; keep the service that was polled.
        let inner = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move {
            match dispatcher.handle(req).await {
                Ok(response) => Ok(response),
                Err(req) => inner.oneshot(req).await,
            }
        })
    }
}

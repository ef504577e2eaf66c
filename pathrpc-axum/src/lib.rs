//! # pathrpc-axum
//!
//! Path-routed JSON RPC for [Axum](https://github.com/tokio-rs/axum).
//!
//! Routes are declared with a method, a path pattern (`/users/:id`,
//! `/files/*path`, `/posts{/:slug}`) and a typed async handler. The
//! [`Dispatcher`] compiles them into one matcher per method, decodes path
//! parameters and request data, runs schema checks, invokes the handler and
//! writes the result as JSON, as a streamed JSON text sequence, or as a raw
//! response.
//!
//! ## Features
//!
//! - **Deterministic matching:** literal routes beat parameters, parameters
//!   beat wildcards, and longer patterns beat shorter ones.
//! - **Structured query strings:** bodyless requests carry typed data with
//!   the compact codec from [`pathrpc_core::query`].
//! - **Streaming:** `json-seq` routes stream frames as the client reads
//!   them and finish with pagination links.
//! - **Tower-native:** mount with [`Dispatcher::into_router`] or put
//!   [`Dispatcher::layer`] in front of an existing service.
//!
//! ```rust
//! use pathrpc_axum::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Hello {
//!     name: String,
//! }
//!
//! let app = RouterBuilder::new()
//!     .route(Route::get("/hello/:name").json(|p: Hello, _: (), _ctx| async move {
//!         Ok::<_, RouteError>(format!("hello {}", p.name))
//!     }))
//!     .build()
//!     .unwrap()
//!     .into_router();
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod cors;
mod decode;
pub mod dispatch;
pub mod error;
mod format;
pub mod layer;
pub mod limits;
pub mod route;
pub mod schema;
pub mod table;

pub use builder::RouterBuilder;
pub use config::DispatcherConfig;
pub use context::RequestContext;
pub use cors::{AllowedOrigins, CorsConfig};
pub use dispatch::Dispatcher;
pub use error::{BuildError, HttpError, RouteError};
pub use layer::{RpcLayer, RpcService};
pub use limits::MessageLimits;
pub use route::{Pagination, Route, RouteBuilder, Yield};
pub use schema::Schema;
pub use table::RouteTable;

pub use pathrpc_core;
pub use pathrpc_core::{QueryMode, ResultFormat, RouteSpec, ValidationError};

pub mod prelude {
    //! The most common types.
    pub use crate::builder::RouterBuilder;
    pub use crate::context::RequestContext;
    pub use crate::error::{HttpError, RouteError};
    pub use crate::route::{Pagination, Route, Yield};
}

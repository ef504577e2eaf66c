//! Client for pathrpc servers.
//!
//! Routes are called by name. A [`RouteMap`] compiled from the server's
//! [`RouteSpec`](pathrpc_core::RouteSpec)s knows how to turn path
//! parameters and data into a request; [`Client`] sends it over any
//! [`tower::Service`] and decodes the result.
//!
//! ```ignore
//! use pathrpc_client::Client;
//!
//! let client = Client::from_specs(service, &specs, "/api")?
//!     .with_origin("http://localhost:3000");
//!
//! let post: Post = client.call("getPost", &PostId { id: 7 }, &()).await?;
//!
//! // json-seq routes, following `$next` links
//! let mut posts = Box::pin(client.pages::<Post, _, _>("listPosts", &(), &Filter::default()));
//! while let Some(post) = posts.next().await {
//!     println!("{:?}", post?);
//! }
//! ```

mod client;
pub mod error;
pub mod route_map;
pub mod stream;

pub use client::Client;
pub use error::ClientError;
pub use route_map::RouteMap;
pub use stream::{SeqItem, SeqStream};

pub use pathrpc_core;

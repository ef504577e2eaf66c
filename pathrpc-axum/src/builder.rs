//! Builder for a [`Dispatcher`].
//!
//! ```rust
//! use std::time::Duration;
//! use pathrpc_axum::{CorsConfig, MessageLimits, Route, RouteError, RouterBuilder};
//!
//! let dispatcher = RouterBuilder::new()
//!     .prefix("/api")
//!     .cors(CorsConfig::new().max_age(Duration::from_secs(600)))
//!     .message_limits(MessageLimits::new(1024 * 1024))
//!     .route(Route::get("/ping").json(|_: (), _: (), _ctx| async move {
//!         Ok::<_, RouteError>("pong")
//!     }))
//!     .build()
//!     .unwrap();
//! assert_eq!(dispatcher.specs()[0].name, "GET /ping");
//! ```

use crate::config::{DispatcherConfig, normalize_prefix};
use crate::cors::CorsConfig;
use crate::dispatch::Dispatcher;
use crate::error::BuildError;
use crate::limits::MessageLimits;
use crate::route::Route;
use crate::table::RouteTable;

/// Collects routes and settings, then compiles them into a [`Dispatcher`].
#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
    config: DispatcherConfig,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`DispatcherConfig::from_env`].
    pub fn from_env() -> Self {
        Self::with_config(DispatcherConfig::from_env())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            routes: Vec::new(),
            config,
        }
    }

    /// Mount every route under `prefix`.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.config.prefix = normalize_prefix(prefix);
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = cors;
        self
    }

    /// Set the request body limit. Default is 4 MiB.
    pub fn message_limits(mut self, limits: MessageLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Hide unhandled error messages from clients.
    pub fn production(mut self, production: bool) -> Self {
        self.config.production = production;
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let table = RouteTable::compile(self.routes)?;
        Ok(Dispatcher::new(table, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;

    fn ping() -> Route {
        Route::get("/ping").json(|_: (), _: (), _ctx| async move { Ok::<_, RouteError>("pong") })
    }

    #[test]
    fn test_builder_settings() {
        let dispatcher = RouterBuilder::new()
            .prefix("api/")
            .production(true)
            .message_limits(MessageLimits::unlimited())
            .route(ping())
            .build()
            .unwrap();
        let config = dispatcher.config();
        assert_eq!(config.prefix, "/api");
        assert!(config.production);
        assert_eq!(config.limits.max_body_size(), None);
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = RouterBuilder::new()
            .routes([ping(), ping()])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateName(_)));
    }
}

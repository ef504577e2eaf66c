//! The request dispatcher.
//!
//! [`Dispatcher::handle`] runs one request through three steps:
//!
//! 1. **Match**: strip the prefix, answer CORS preflights, pick the method
//!    group and take the first route whose pattern matches.
//! 2. **Decode**: path parameters, then request data (JSON body for
//!    `PATCH`/`POST`/`PUT`, the query string otherwise), then the route's
//!    schemas. Failures answer 400 (413 for oversized bodies).
//! 3. **Respond**: invoke the handler and format its result.
//!
//! A request that fails to match is handed back untouched so the caller
//! can route it elsewhere.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use pathrpc_core::RouteSpec;
use pathrpc_core::route::method_has_body;

use crate::config::DispatcherConfig;
use crate::context::RequestContext;
use crate::cors::CorsPolicy;
use crate::decode;
use crate::error::{BuildError, HttpError};
use crate::format::{self, LinkBuilder};
use crate::layer::RpcLayer;
use crate::route::{Input, Route};
use crate::table::RouteTable;

/// Lifecycle step a request failed in, for logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Match,
    Decode,
    Respond,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Step::Match => "match",
            Step::Decode => "decode",
            Step::Respond => "respond",
        }
    }
}

/// Serves a [`RouteTable`].
///
/// Cloning is cheap. Clones share the table, so [`reload`](Self::reload)
/// on any clone is seen by all of them.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<ArcSwap<RouteTable>>,
    config: Arc<DispatcherConfig>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.load().specs().len())
            .field("config", &self.config)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(table: RouteTable, config: DispatcherConfig) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(table)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The table currently served.
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub fn specs(&self) -> Vec<RouteSpec> {
        self.table.load().specs().to_vec()
    }

    /// Compile `routes` and swap them in. Requests already in flight finish
    /// on the old table. On error the old table stays.
    pub fn reload(&self, routes: Vec<Route>) -> Result<(), BuildError> {
        let table = RouteTable::compile(routes)?;
        tracing::info!(routes = table.specs().len(), "route table reloaded");
        self.table.store(Arc::new(table));
        Ok(())
    }

    /// Mount as an axum router answering 404 for unmatched requests.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request<Body>| {
            let dispatcher = self.clone();
            async move {
                match dispatcher.handle(request).await {
                    Ok(response) => response,
                    Err(_) => StatusCode::NOT_FOUND.into_response(),
                }
            }
        })
    }

    /// A tower layer serving these routes in front of another service.
    pub fn layer(&self) -> RpcLayer {
        RpcLayer::new(self.clone())
    }

    /// Serve `request`, or hand it back when no route matches.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response, Request<Body>> {
        let table = self.table.load_full();
        let path = match strip_prefix(&self.config.prefix, request.uri().path()) {
            Some(path) => path.to_string(),
            None => return Err(request),
        };

        if request.method() == Method::OPTIONS {
            let methods = table.methods_matching(&path);
            if methods.is_empty() {
                return Err(request);
            }
            let cors = &self.config.cors;
            return Ok(match cors.resolve(request.headers()) {
                Ok(policy) => cors.preflight(&policy, &methods, request.headers()),
                Err(err) => reject(Step::Match, &path, err, &CorsPolicy::default()),
            });
        }

        let Some(group) = table.group(request.method()) else {
            return Err(request);
        };
        let policy = match self.config.cors.resolve(request.headers()) {
            Ok(policy) => policy,
            Err(err) => return Ok(reject(Step::Match, &path, err, &CorsPolicy::default())),
        };

        let (compiled, params_query, params_json) = {
            let Some(found) = group.matcher.matches(&path).next() else {
                return Err(request);
            };
            let compiled = group.routes[found.index].clone();
            let params_json = compiled
                .route
                .params_schema
                .as_ref()
                .map(|_| decode::params_json(&found.params));
            (compiled, decode::params_query(&found.params), params_json)
        };
        let route = &compiled.route;
        tracing::debug!(
            method = %request.method(),
            path = %path,
            route = %compiled.spec.name,
            "matched route"
        );

        let (parts, body) = request.into_parts();
        let head_only = parts.method == Method::HEAD;
        let data = if method_has_body(&parts.method) {
            decode::body_data(&parts.headers, body, &self.config.limits).await
        } else {
            decode::query_data(parts.uri.query(), route.query)
        };
        let data = match data {
            Ok(data) => data,
            Err(err) => return Ok(reject(Step::Decode, &path, err, &policy)),
        };

        if let (Some(schema), Some(params)) = (&route.params_schema, &params_json) {
            if let Err(err) = schema.check(params) {
                return Ok(reject(Step::Decode, &path, err.into(), &policy));
            }
        }
        if let Some(schema) = &route.data_schema {
            if let Err(err) = schema.check(&data) {
                return Ok(reject(Step::Decode, &path, err.into(), &policy));
            }
        }

        let links = LinkBuilder::new(
            parts.uri.path(),
            parts.uri.query(),
            compiled.param_names.clone(),
            route.query,
        );
        let ctx = RequestContext::new(parts.method, parts.uri, parts.headers, &compiled.spec.name);

        let future = match (route.invoke)(
            Input {
                params_query,
                data,
            },
            ctx.clone(),
        ) {
            Ok(future) => future,
            Err(err) => return Ok(reject(Step::Decode, &path, err, &policy)),
        };

        let production = self.config.production;
        let mut response = match future.await {
            Ok(reply) => {
                let mut response = format::respond(reply, links, production);
                ctx.apply(&mut response);
                response
            }
            Err(err) => {
                tracing::debug!(
                    step = Step::Respond.as_str(),
                    route = %compiled.spec.name,
                    error = %err,
                    "handler failed"
                );
                err.into_response(production)
            }
        };

        if head_only {
            *response.body_mut() = Body::empty();
        }
        policy.apply(response.headers_mut());
        Ok(response)
    }
}

/// Path relative to `prefix`, or `None` outside of it.
fn strip_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(prefix)? {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

fn reject(step: Step, path: &str, err: HttpError, policy: &CorsPolicy) -> Response {
    tracing::warn!(
        step = step.as_str(),
        path,
        status = err.status().as_u16(),
        message = err.message().unwrap_or_default(),
        "request rejected"
    );
    let mut response = err.into_response();
    policy.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("", "/a"), Some("/a"));
        assert_eq!(strip_prefix("/api", "/api"), Some("/"));
        assert_eq!(strip_prefix("/api", "/api/a/b"), Some("/a/b"));
        assert_eq!(strip_prefix("/api", "/apix"), None);
        assert_eq!(strip_prefix("/api", "/other"), None);
    }

    #[test]
    fn test_step_names() {
        assert_eq!(Step::Match.as_str(), "match");
        assert_eq!(Step::Decode.as_str(), "decode");
        assert_eq!(Step::Respond.as_str(), "respond");
    }
}

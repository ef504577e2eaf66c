//! Route declarations.
//!
//! A route is a method, a path pattern, and a handler with one of three
//! result formats:
//!
//! ```rust
//! use pathrpc_axum::{Route, RouteError};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct PostId {
//!     id: u64,
//! }
//!
//! #[derive(Serialize)]
//! struct Post {
//!     id: u64,
//!     title: String,
//! }
//!
//! let route = Route::get("/posts/:id")
//!     .name("getPost")
//!     .json(|params: PostId, _data: (), _ctx| async move {
//!         Ok::<_, RouteError>(Post { id: params.id, title: "hello".into() })
//!     });
//! ```
//!
//! Handlers receive the decoded path parameters, the decoded request data
//! (JSON body for `PATCH`/`POST`/`PUT`, the query string otherwise) and a
//! [`RequestContext`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use pathrpc_core::{Object, QueryMode, ResultFormat, Value, json_seq};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::error::{HttpError, RouteError};
use crate::schema::{Schema, deserialize_data};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One item produced by a json-seq handler.
#[derive(Clone, Debug, PartialEq)]
pub enum Yield<T, P = Object> {
    /// A value, written as one frame.
    Next(T),
    /// The end of the sequence. Remaining items are not polled.
    Return(Pagination<P>),
}

/// Query overrides for the previous and next page.
///
/// Each side is serialized to an object whose members are laid over the
/// current request's query string to build the link.
#[derive(Clone, Debug, PartialEq)]
pub struct Pagination<P = Object> {
    pub prev: Option<P>,
    pub next: Option<P>,
}

impl<P> Pagination<P> {
    pub fn new(prev: Option<P>, next: Option<P>) -> Self {
        Self { prev, next }
    }

    pub fn next(next: P) -> Self {
        Self {
            prev: None,
            next: Some(next),
        }
    }

    pub fn prev(prev: P) -> Self {
        Self {
            prev: Some(prev),
            next: None,
        }
    }
}

/// What a handler produced, with its type erased.
pub(crate) enum Reply {
    Json(serde_json::Value),
    Seq(BoxStream<'static, Result<SeqItem, RouteError>>),
    Raw(Response),
}

pub(crate) enum SeqItem {
    Frame(Bytes),
    Return(Pagination<Object>),
}

/// Decoded inputs of a request, before they are typed.
pub(crate) struct Input {
    /// Path captures as a serde_qs query (`id=1&rest[0]=a`), empty when the
    /// pattern has no parameters.
    pub params_query: String,
    pub data: serde_json::Value,
}

pub(crate) type Invoke = Arc<
    dyn Fn(Input, RequestContext) -> Result<BoxFuture<Result<Reply, RouteError>>, HttpError>
        + Send
        + Sync,
>;

/// A declared route.
#[derive(Clone)]
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) query: QueryMode,
    pub(crate) format: ResultFormat,
    pub(crate) params_schema: Option<Arc<dyn Schema>>,
    pub(crate) data_schema: Option<Arc<dyn Schema>>,
    pub(crate) invoke: Invoke,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("query", &self.query)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new<S: Into<String>>(method: Method, path: S) -> RouteBuilder {
        RouteBuilder {
            method,
            path: path.into(),
            name: None,
            query: QueryMode::default(),
            params_schema: None,
            data_schema: None,
        }
    }

    pub fn get<S: Into<String>>(path: S) -> RouteBuilder {
        Self::new(Method::GET, path)
    }

    pub fn post<S: Into<String>>(path: S) -> RouteBuilder {
        Self::new(Method::POST, path)
    }

    pub fn put<S: Into<String>>(path: S) -> RouteBuilder {
        Self::new(Method::PUT, path)
    }

    pub fn patch<S: Into<String>>(path: S) -> RouteBuilder {
        Self::new(Method::PATCH, path)
    }

    pub fn delete<S: Into<String>>(path: S) -> RouteBuilder {
        Self::new(Method::DELETE, path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> ResultFormat {
        self.format
    }
}

/// A route waiting for its handler.
pub struct RouteBuilder {
    method: Method,
    path: String,
    name: Option<String>,
    query: QueryMode,
    params_schema: Option<Arc<dyn Schema>>,
    data_schema: Option<Arc<dyn Schema>>,
}

impl RouteBuilder {
    /// Name the route. Defaults to `"<METHOD> <path>"`.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read query parameters as plain strings instead of codec values.
    ///
    /// Only suitable when every field of the request data is a string. A
    /// repeated key keeps its last value.
    pub fn plain_query(mut self) -> Self {
        self.query = QueryMode::Plain;
        self
    }

    pub fn params_schema(mut self, schema: impl Schema) -> Self {
        self.params_schema = Some(Arc::new(schema));
        self
    }

    pub fn data_schema(mut self, schema: impl Schema) -> Self {
        self.data_schema = Some(Arc::new(schema));
        self
    }

    /// Respond with one JSON document. A `null` result is sent as an empty
    /// body.
    pub fn json<P, D, T, F, Fut>(self, handler: F) -> Route
    where
        P: DeserializeOwned + Send + 'static,
        D: DeserializeOwned + Send + 'static,
        T: Serialize + Send + 'static,
        F: Fn(P, D, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RouteError>> + Send + 'static,
    {
        self.finish(ResultFormat::Json, move |params, data, ctx| {
            let fut = handler(params, data, ctx);
            Box::pin(async move {
                let value = fut.await?;
                Ok(Reply::Json(serde_json::to_value(&value)?))
            })
        })
    }

    /// Respond with a JSON text sequence.
    ///
    /// The handler resolves to a stream of [`Yield`] items. Frames are
    /// written as the transport asks for them; a [`Yield::Return`] ends
    /// the response with a pagination frame.
    pub fn json_seq<P, D, T, Pg, S, F, Fut>(self, handler: F) -> Route
    where
        P: DeserializeOwned + Send + 'static,
        D: DeserializeOwned + Send + 'static,
        T: Serialize + Send + 'static,
        Pg: Serialize + Send + 'static,
        S: Stream<Item = Result<Yield<T, Pg>, RouteError>> + Send + 'static,
        F: Fn(P, D, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, RouteError>> + Send + 'static,
    {
        self.finish(ResultFormat::JsonSeq, move |params, data, ctx| {
            let fut = handler(params, data, ctx);
            Box::pin(async move {
                let stream = fut.await?;
                let items = stream.map(|item| match item? {
                    Yield::Next(value) => Ok(SeqItem::Frame(json_seq::encode_frame(&value)?)),
                    Yield::Return(pagination) => Ok(SeqItem::Return(Pagination {
                        prev: pagination.prev.map(to_object).transpose()?,
                        next: pagination.next.map(to_object).transpose()?,
                    })),
                });
                Ok(Reply::Seq(items.boxed()))
            })
        })
    }

    /// Let the handler build the whole response.
    pub fn raw<P, D, F, Fut>(self, handler: F) -> Route
    where
        P: DeserializeOwned + Send + 'static,
        D: DeserializeOwned + Send + 'static,
        F: Fn(P, D, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.finish(ResultFormat::Raw, move |params, data, ctx| {
            let fut = handler(params, data, ctx);
            Box::pin(async move { Ok(Reply::Raw(fut.await?)) })
        })
    }

    fn finish<P, D, H>(self, format: ResultFormat, handler: H) -> Route
    where
        P: DeserializeOwned + Send + 'static,
        D: DeserializeOwned + Send + 'static,
        H: Fn(P, D, RequestContext) -> BoxFuture<Result<Reply, RouteError>>
            + Send
            + Sync
            + 'static,
    {
        let invoke: Invoke = Arc::new(move |input: Input, ctx: RequestContext| {
            let params: P = decode_params(&input.params_query)?;
            let data: D = deserialize_data(input.data)?;
            Ok(handler(params, data, ctx))
        });
        Route {
            method: self.method,
            path: self.path,
            name: self.name,
            query: self.query,
            format,
            params_schema: self.params_schema,
            data_schema: self.data_schema,
            invoke,
        }
    }
}

fn to_object<P: Serialize>(page: P) -> Result<Object, RouteError> {
    Ok(Value::object_from_serialize(&page)?)
}

/// Decode path captures. Values arrive as strings and are coerced to the
/// declared field types by serde_qs.
fn decode_params<P: DeserializeOwned>(query: &str) -> Result<P, HttpError> {
    if query.is_empty() {
        return deserialize_data(serde_json::Value::Object(Default::default()))
            .map_err(HttpError::from);
    }
    serde_qs::from_str(query).map_err(|err| {
        HttpError::from(pathrpc_core::ValidationError::new(format!(
            "invalid path parameters: {err}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use serde::Deserialize;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new(), "test")
    }

    fn input(params_query: &str, data: serde_json::Value) -> Input {
        Input {
            params_query: params_query.to_string(),
            data,
        }
    }

    #[derive(Deserialize)]
    struct Ids {
        id: u64,
        #[serde(default)]
        rest: Vec<String>,
    }

    #[tokio::test]
    async fn test_json_route_decodes_and_invokes() {
        let route = Route::get("/items/:id/*rest").json(|params: Ids, data: serde_json::Value, _ctx| async move {
            Ok::<_, RouteError>(json!({ "id": params.id, "rest": params.rest, "data": data }))
        });
        assert_eq!(route.format(), ResultFormat::Json);

        let future = (route.invoke)(input("id=7&rest[0]=a&rest[1]=b", json!({ "q": 1 })), ctx())
            .unwrap();
        let Ok(Reply::Json(value)) = future.await else {
            panic!("expected a json reply");
        };
        assert_eq!(value, json!({ "id": 7, "rest": ["a", "b"], "data": { "q": 1 } }));
    }

    #[test]
    fn test_invalid_path_param_is_400() {
        let route = Route::get("/items/:id")
            .json(|_: Ids, _: (), _ctx| async move { Ok::<_, RouteError>(()) });
        let Err(err) = (route.invoke)(input("id=abc", json!({})), ctx()) else {
            panic!("expected a decode error");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_data_is_400_with_pointer() {
        #[derive(Deserialize)]
        struct Query {
            #[allow(dead_code)]
            limit: u32,
        }
        let route =
            Route::get("/items").json(|_: (), _: Query, _ctx| async move { Ok::<_, RouteError>(()) });
        let Err(err) = (route.invoke)(input("", json!({ "limit": "ten" })), ctx()) else {
            panic!("expected a decode error");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().unwrap()["path"], "/limit");
    }

    #[tokio::test]
    async fn test_json_seq_route_encodes_frames_and_pagination() {
        #[derive(Serialize)]
        struct Page {
            page: u32,
        }
        let route = Route::get("/items").json_seq(|_: (), _: (), _ctx| async move {
            let items = vec![
                Ok(Yield::Next(1)),
                Ok(Yield::Return(Pagination::next(Page { page: 2 }))),
            ];
            Ok::<_, RouteError>(futures::stream::iter(items))
        });
        let future = (route.invoke)(input("", json!({})), ctx()).unwrap();
        let Ok(Reply::Seq(stream)) = future.await else {
            panic!("expected a json-seq reply");
        };
        let items: Vec<_> = stream.collect().await;
        assert!(matches!(&items[0], Ok(SeqItem::Frame(bytes)) if &bytes[..] == b"\x1e1\n"));
        let Ok(SeqItem::Return(pagination)) = &items[1] else {
            panic!("expected pagination");
        };
        assert_eq!(pagination.prev, None);
        assert_eq!(pagination.next.as_ref().unwrap().get("page"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_default_route_attributes() {
        let route = Route::post("/items").raw(|_: (), _: (), _ctx| async move {
            Ok::<_, RouteError>(Response::new(axum::body::Body::empty()))
        });
        assert_eq!(route.method(), Method::POST);
        assert_eq!(route.path(), "/items");
        assert_eq!(route.query, QueryMode::Codec);
        assert!(route.name.is_none());
    }
}

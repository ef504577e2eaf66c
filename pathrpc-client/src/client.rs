use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::{Method, Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use pathrpc_core::{RouteSpec, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::{Service, ServiceExt};

use crate::error::ClientError;
use crate::route_map::RouteMap;
use crate::stream::{SeqItem, SeqStream};

/// Calls pathrpc routes by name.
///
/// The transport is any [`tower::Service`] taking `http::Request`s: a
/// hyper client, an `axum::Router` in tests, or a stack of layers around
/// either. The service is cloned per call.
#[derive(Clone, Debug)]
pub struct Client<S> {
    service: S,
    origin: String,
    routes: RouteMap,
}

impl<S> Client<S> {
    pub fn new(service: S, routes: RouteMap) -> Self {
        Self {
            service,
            origin: String::new(),
            routes,
        }
    }

    /// Build the route map from `specs` mounted under `prefix`.
    pub fn from_specs<'a, I>(service: S, specs: I, prefix: &str) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = &'a RouteSpec>,
    {
        let routes = RouteMap::compile(specs, prefix)
            .map_err(|err| ClientError::Encode(err.to_string()))?;
        Ok(Self::new(service, routes))
    }

    /// Scheme and authority prepended to every request path, e.g.
    /// `http://localhost:3000`. Empty by default.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }
}

impl<S, B> Client<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>> + Clone,
    S::Error: Display,
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    fn build<P, D>(&self, name: &str, params: &P, data: &D) -> Result<Request<Full<Bytes>>, ClientError>
    where
        P: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let params = Value::object_from_serialize(params)?;
        let data = Value::object_from_serialize(data)?;
        self.routes.request(name, &self.origin, &params, &data)
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<B>, ClientError> {
        tracing::debug!(method = %request.method(), uri = %request.uri(), "sending request");
        self.service
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))
    }

    /// Call a `json` route and decode its result.
    ///
    /// `params` fills the path pattern and `data` becomes the query string
    /// or JSON body. Pass `&()` for either when there is nothing to send.
    pub async fn call<T, P, D>(&self, name: &str, params: &P, data: &D) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let request = self.build(name, params, data)?;
        let response = check_status(self.send(request).await?).await?;
        let body = read_body(response.into_body()).await?;
        let value = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body)
                .map_err(|err| ClientError::Decode(format!("JSON decoding failed: {err}")))?
        };
        serde_json::from_value(value)
            .map_err(|err| ClientError::Decode(format!("JSON decoding failed: {err}")))
    }

    /// Call a `json-seq` route. Items arrive as the server writes them.
    pub async fn stream<T, P, D>(
        &self,
        name: &str,
        params: &P,
        data: &D,
    ) -> Result<SeqStream<B, T>, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let request = self.build(name, params, data)?;
        let response = check_status(self.send(request).await?).await?;
        Ok(SeqStream::new(response.into_body()))
    }

    /// Request a pagination link returned by a `json-seq` route.
    pub async fn follow<T: DeserializeOwned>(
        &self,
        link: &str,
    ) -> Result<SeqStream<B, T>, ClientError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("{}{link}", self.origin))
            .body(Full::new(Bytes::new()))
            .map_err(|err| ClientError::Encode(err.to_string()))?;
        let response = check_status(self.send(request).await?).await?;
        Ok(SeqStream::new(response.into_body()))
    }

    /// Every item of a `json-seq` route, following `$next` links until the
    /// server stops returning one.
    pub fn pages<'a, T, P, D>(
        &'a self,
        name: &'a str,
        params: &'a P,
        data: &'a D,
    ) -> impl Stream<Item = Result<T, ClientError>> + 'a
    where
        T: DeserializeOwned + 'a,
        P: Serialize + ?Sized,
        D: Serialize + ?Sized,
        B: 'a,
    {
        async_stream::try_stream! {
            let mut page = Box::pin(self.stream::<T, P, D>(name, params, data).await?);
            loop {
                let mut next = None;
                while let Some(item) = page.next().await {
                    match item? {
                        SeqItem::Next(value) => yield value,
                        SeqItem::Links { next: link, .. } => next = link,
                    }
                }
                let Some(link) = next else {
                    break;
                };
                tracing::debug!(%link, "following next page");
                page = Box::pin(self.follow::<T>(&link).await?);
            }
        }
    }

    /// Call a `raw` route and return the response untouched, apart from
    /// turning error statuses into [`ClientError::Status`].
    pub async fn raw<P, D>(&self, name: &str, params: &P, data: &D) -> Result<Response<B>, ClientError>
    where
        P: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let request = self.build(name, params, data)?;
        check_status(self.send(request).await?).await
    }
}

async fn read_body<B>(body: B) -> Result<Bytes, ClientError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|err| ClientError::Transport(format!("failed to read response body: {err}")))
}

async fn check_status<B>(response: Response<B>) -> Result<Response<B>, ClientError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_body(response.into_body()).await?;
    let body = serde_json::from_slice(&body).ok();
    Err(ClientError::from_body(status, body))
}

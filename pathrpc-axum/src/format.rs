//! Response formatters: `json`, `json-seq` and `raw`.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use futures::StreamExt;
use futures::stream::BoxStream;
use pathrpc_core::{Object, QueryMode, json_seq, query};
use url::form_urlencoded;

use crate::error::RouteError;
use crate::route::{Reply, SeqItem};

/// Turn a handler reply into a response.
pub(crate) fn respond(reply: Reply, links: LinkBuilder, production: bool) -> Response {
    match reply {
        Reply::Json(value) => json_response(&value),
        Reply::Seq(items) => seq_response(items, links, production),
        Reply::Raw(response) => response,
    }
}

/// A `null` result is an empty body with `Content-Length: 0`.
pub(crate) fn json_response(value: &serde_json::Value) -> Response {
    if value.is_null() {
        return response(StatusCode::OK, None, Body::empty(), Some(0));
    }
    match serde_json::to_vec(value) {
        Ok(bytes) => response(StatusCode::OK, Some("application/json"), Body::from(bytes), None),
        Err(err) => RouteError::from(err).into_response(true),
    }
}

/// Stream `items` as a JSON text sequence.
///
/// Items are pulled only when the transport polls the body. A
/// [`SeqItem::Return`] or an error ends the response; a dropped body drops
/// the item stream with it.
pub(crate) fn seq_response(
    mut items: BoxStream<'static, Result<SeqItem, RouteError>>,
    links: LinkBuilder,
    production: bool,
) -> Response {
    let frames = async_stream::stream! {
        let mut guard = DisconnectGuard { path: links.path.clone(), finished: false };
        while let Some(item) = items.next().await {
            match item {
                Ok(SeqItem::Frame(frame)) => yield Ok::<Bytes, Infallible>(frame),
                Ok(SeqItem::Return(pagination)) => {
                    let prev = pagination.prev.map(|page| links.link(&page));
                    let next = pagination.next.map(|page| links.link(&page));
                    yield Ok(json_seq::pagination_frame(prev.as_deref(), next.as_deref()));
                    break;
                }
                Err(err) => {
                    yield Ok(json_seq::error_frame(err.to_frame_json(production)));
                    break;
                }
            }
        }
        guard.finished = true;
    };
    response(
        StatusCode::OK,
        Some(json_seq::CONTENT_TYPE),
        Body::from_stream(frames),
        None,
    )
}

fn response(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Body,
    content_length: Option<u64>,
) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    if let Some(length) = content_length {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    response
}

struct DisconnectGuard {
    path: String,
    finished: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(path = %self.path, "json-seq response dropped before completion");
        }
    }
}

/// Builds pagination links relative to the current request.
///
/// A link keeps the current query string and lays the page's members over
/// it. Keys naming path parameters are skipped, and the resulting query is
/// written in ascending key order.
#[derive(Clone, Debug)]
pub(crate) struct LinkBuilder {
    path: String,
    /// Current query members: decoded key to still-encoded value.
    current: BTreeMap<String, String>,
    skip: Vec<String>,
    mode: QueryMode,
}

impl LinkBuilder {
    pub(crate) fn new(path: &str, query: Option<&str>, skip: Vec<String>, mode: QueryMode) -> Self {
        let mut current = BTreeMap::new();
        for pair in query.unwrap_or("").split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key: String = form_urlencoded::parse(key.as_bytes())
                .next()
                .map(|(key, _)| key.into_owned())
                .unwrap_or_default();
            current.insert(key, value.to_string());
        }
        Self {
            path: path.to_string(),
            current,
            skip,
            mode,
        }
    }

    pub(crate) fn link(&self, page: &Object) -> String {
        let mut members = self.current.clone();
        for (key, value) in page {
            let encoded = match self.mode {
                QueryMode::Codec => query::encode_value(value),
                QueryMode::Plain => {
                    form_urlencoded::byte_serialize(value.to_plain_string().as_bytes()).collect()
                }
            };
            members.insert(key.clone(), encoded);
        }

        let mut out = self.path.clone();
        let mut first = true;
        for (key, value) in &members {
            if self.skip.iter().any(|skip| skip == key) {
                continue;
            }
            out.push(if first { '?' } else { '&' });
            first = false;
            out.extend(form_urlencoded::byte_serialize(key.as_bytes()));
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Pagination;
    use http_body_util::BodyExt;
    use pathrpc_core::Value;
    use pathrpc_core::json_seq::{Frame, FrameDecoder};

    fn page(members: &[(&str, Value)]) -> Object {
        members
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    async fn frames(response: Response) -> Vec<Frame> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        let mut frames = vec![];
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_link_overlays_current_query() {
        let links = LinkBuilder::new(
            "/api/users/7/posts",
            Some("page=1&sort='new'&id=7"),
            vec!["id".into()],
            QueryMode::Codec,
        );
        assert_eq!(
            links.link(&page(&[("page", Value::from(2))])),
            "/api/users/7/posts?page=2&sort='new'"
        );
        assert_eq!(
            links.link(&page(&[("cursor", Value::from("a b"))])),
            "/api/users/7/posts?cursor='a+b'&page=1&sort='new'"
        );
    }

    #[test]
    fn test_link_plain_mode() {
        let links = LinkBuilder::new("/search", Some("q=rust+lang"), vec![], QueryMode::Plain);
        assert_eq!(
            links.link(&page(&[("after", Value::from("x&y"))])),
            "/search?after=x%26y&q=rust+lang"
        );
    }

    #[test]
    fn test_link_without_query() {
        let links = LinkBuilder::new("/items", None, vec![], QueryMode::Codec);
        assert_eq!(links.link(&Object::new()), "/items");
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = json_response(&serde_json::json!({ "ok": true }));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_null_json_response_is_empty() {
        let response = json_response(&serde_json::Value::Null);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_seq_response_with_pagination() {
        let items: Vec<Result<SeqItem, RouteError>> = vec![
            Ok(SeqItem::Frame(json_seq::encode_frame(&1).unwrap())),
            Ok(SeqItem::Frame(json_seq::encode_frame(&2).unwrap())),
            Ok(SeqItem::Return(Pagination::next(page(&[("page", Value::from(2))])))),
            Ok(SeqItem::Frame(json_seq::encode_frame(&3).unwrap())),
        ];
        let links = LinkBuilder::new("/items", None, vec![], QueryMode::Codec);
        let response = seq_response(futures::stream::iter(items).boxed(), links, false);
        assert_eq!(response.headers()[header::CONTENT_TYPE], json_seq::CONTENT_TYPE);
        assert_eq!(
            frames(response).await,
            vec![
                Frame::Value(1.into()),
                Frame::Value(2.into()),
                Frame::Links {
                    prev: None,
                    next: Some("/items?page=2".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_seq_response_error_frame_ends_stream() {
        let items: Vec<Result<SeqItem, RouteError>> = vec![
            Ok(SeqItem::Frame(json_seq::encode_frame(&1).unwrap())),
            Err(RouteError::unhandled("boom")),
            Ok(SeqItem::Frame(json_seq::encode_frame(&2).unwrap())),
        ];
        let links = LinkBuilder::new("/items", None, vec![], QueryMode::Codec);
        let response = seq_response(futures::stream::iter(items).boxed(), links, false);
        assert_eq!(
            frames(response).await,
            vec![
                Frame::Value(1.into()),
                Frame::Error(serde_json::json!({ "status": 500, "message": "boom" })),
            ]
        );
    }
}

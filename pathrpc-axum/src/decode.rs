//! Decoding of path captures, query strings and request bodies into the
//! JSON form handed to schemas and handlers.

use axum::body::Body;
use axum::http::{HeaderMap, header};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use pathrpc_core::{ParamValue, Params, QueryMode, Value, query};
use serde_json::Map;
use url::form_urlencoded;

use crate::error::HttpError;
use crate::limits::MessageLimits;

/// Path captures as a serde_qs query string.
///
/// Single captures become `name=value`, wildcard captures become indexed
/// lists (`rest[0]=a&rest[1]=b`) so they can decode into a `Vec`. Names
/// are word characters or `*` and need no escaping.
pub(crate) fn params_query(params: &Params<'_>) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.extend(form_urlencoded::byte_serialize(value.as_bytes()));
    };
    for (name, value) in params.iter() {
        match value {
            ParamValue::One(value) => push(name, &**value),
            ParamValue::Many(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    push(&format!("{name}[{i}]"), &**segment);
                }
            }
        }
    }
    out
}

/// Path captures as a JSON object, for params schemas.
pub(crate) fn params_json(params: &Params<'_>) -> serde_json::Value {
    let map: Map<String, serde_json::Value> = params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                ParamValue::One(value) => serde_json::Value::String(value.to_string()),
                ParamValue::Many(segments) => segments
                    .iter()
                    .map(|s| serde_json::Value::String(s.to_string()))
                    .collect(),
            };
            (name.to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}

/// Request data carried in the query string of a bodyless request.
pub(crate) fn query_data(query: Option<&str>, mode: QueryMode) -> Result<serde_json::Value, HttpError> {
    let query = query.unwrap_or("");
    match mode {
        QueryMode::Plain => Ok(plain_query(query)),
        QueryMode::Codec => {
            let object = query::decode_str(query)?;
            Ok(Value::Object(object).into())
        }
    }
}

/// Every value a string; a repeated key keeps its last value.
fn plain_query(query: &str) -> serde_json::Value {
    let map: Map<String, serde_json::Value> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), serde_json::Value::String(value.into_owned())))
        .collect();
    serde_json::Value::Object(map)
}

/// Read a JSON request body. An empty body is `null`.
pub(crate) async fn body_data(
    headers: &HeaderMap,
    body: Body,
    limits: &MessageLimits,
) -> Result<serde_json::Value, HttpError> {
    if let Some(length) = content_length(headers) {
        limits.check_size(length)?;
    }

    let max = limits.max_body_size().unwrap_or(usize::MAX);
    let bytes = Limited::new(body, max)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                limits.too_large(max.saturating_add(1))
            } else {
                HttpError::bad_request(format!("failed to read request body: {err}"))
            }
        })?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| HttpError::bad_request(format!("invalid JSON body: {err}")))
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use pathrpc_core::Matcher;
    use serde_json::json;

    #[test]
    fn test_params_query_and_json() {
        let matcher = Matcher::compile(["/users/:id/files/*rest"]).unwrap();
        let found = matcher.matches("/users/a%20b/files/x/y").next().unwrap();
        assert_eq!(params_query(&found.params), "id=a+b&rest[0]=x&rest[1]=y");
        assert_eq!(
            params_json(&found.params),
            json!({ "id": "a b", "rest": ["x", "y"] })
        );
    }

    #[test]
    fn test_plain_query() {
        let data = query_data(Some("name=ada&tag=a&tag=b&tag=c&q=a%26b"), QueryMode::Plain).unwrap();
        assert_eq!(data, json!({ "name": "ada", "tag": "c", "q": "a&b" }));
        assert_eq!(query_data(None, QueryMode::Plain).unwrap(), json!({}));
    }

    #[test]
    fn test_codec_query() {
        let data = query_data(Some("limit=10&filter=(tags:('a'))"), QueryMode::Codec).unwrap();
        assert_eq!(data, json!({ "limit": 10, "filter": { "tags": ["a"] } }));
    }

    #[test]
    fn test_codec_query_error_is_400() {
        let err = query_data(Some("a=(b:)"), QueryMode::Codec).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.body().unwrap();
        assert_eq!(body["path"], "/a");
        assert_eq!(body["value"], "(b:)");
    }

    #[tokio::test]
    async fn test_body_data() {
        let limits = MessageLimits::default();
        let value = body_data(&HeaderMap::new(), Body::from(r#"{"a":1}"#), &limits)
            .await
            .unwrap();
        assert_eq!(value, json!({ "a": 1 }));

        let value = body_data(&HeaderMap::new(), Body::empty(), &limits).await.unwrap();
        assert_eq!(value, serde_json::Value::Null);

        let err = body_data(&HeaderMap::new(), Body::from("{"), &limits)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_over_limit_is_413() {
        let limits = MessageLimits::new(4);
        let err = body_data(&HeaderMap::new(), Body::from("[1,2,3]"), &limits)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
        let err = body_data(&headers, Body::empty(), &limits).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

//! Errors raised while building a route table or serving a request.
//!
//! - [`HttpError`]: an error with a deliberate HTTP status. Handlers return
//!   it to pick the status, headers and body of the response.
//! - [`RouteError`]: what a handler returns. Any `std::error::Error`
//!   converts into it with `?` and becomes an opaque 500.
//! - [`BuildError`]: a route table that cannot be compiled.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use pathrpc_core::{DecodeError, PatternError, ValidationError};
use serde_json::json;

/// An error carrying its own HTTP status.
///
/// The response body is `body` when set, otherwise `{"message": ..}` when
/// a message is set, otherwise empty.
#[derive(Clone, Debug)]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
    body: Option<serde_json::Value>,
    headers: Option<HeaderMap>,
}

impl HttpError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: Some(message.into()),
            body: None,
            headers: None,
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            body: None,
            headers: None,
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// Replace the response body with a JSON document.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a response header. Invalid names or values are dropped.
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key_str = key.as_ref();
        let val_str = value.as_ref();

        match HeaderName::from_bytes(key_str.as_bytes()) {
            Ok(name) => match HeaderValue::from_str(val_str) {
                Ok(val) => {
                    self.headers
                        .get_or_insert_with(HeaderMap::new)
                        .append(name, val);
                }
                Err(e) => {
                    tracing::debug!(
                        key = key_str,
                        value = val_str,
                        error = %e,
                        "invalid header value, header dropped"
                    );
                }
            },
            Err(e) => {
                tracing::debug!(key = key_str, error = %e, "invalid header name, header dropped");
            }
        }
        self
    }

    /// The JSON document sent as the response body, if any.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match (&self.body, &self.message) {
            (Some(body), _) => Some(body.clone()),
            (None, Some(message)) => Some(json!({ "message": message })),
            (None, None) => None,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = self.to_json();
        let mut response = match body {
            Some(body) => {
                let mut response =
                    Response::new(Body::from(serde_json::to_vec(&body).unwrap_or_default()));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = self.status;
        if let Some(headers) = self.headers {
            response.headers_mut().extend(headers);
        }
        response
    }
}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        HttpError::from_status(status)
    }
}

impl From<(StatusCode, String)> for HttpError {
    fn from((status, message): (StatusCode, String)) -> Self {
        HttpError::new(status, message)
    }
}

/// A malformed query value: 400 naming the parameter and the raw value.
impl From<DecodeError> for HttpError {
    fn from(err: DecodeError) -> Self {
        let body = json!({
            "message": err.to_string(),
            "path": err.path(),
            "value": err.value,
        });
        HttpError::new(StatusCode::BAD_REQUEST, err.to_string()).with_body(body)
    }
}

/// A schema mismatch: 400 with the most specific failure as the body.
impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        let leaf = err.into_leaf();
        let body = serde_json::to_value(&leaf).unwrap_or_else(|_| json!({ "message": leaf.message }));
        HttpError::new(StatusCode::BAD_REQUEST, leaf.to_string()).with_body(body)
    }
}

/// The error type returned by route handlers.
///
/// `RouteError` does not implement `std::error::Error`, which leaves room for
/// the blanket conversion from every error type.
pub enum RouteError {
    /// Sent to the client as is.
    Http(HttpError),
    /// Logged and answered with a 500.
    Unhandled(Box<dyn std::error::Error + Send + Sync>),
}

impl RouteError {
    /// Wrap an arbitrary message as an unhandled error.
    pub fn unhandled<S: Into<String>>(message: S) -> Self {
        let message: String = message.into();
        RouteError::Unhandled(message.into())
    }

    /// Convert into a response. Unhandled errors are logged here; their
    /// message is only exposed when `production` is false.
    pub fn into_response(self, production: bool) -> Response {
        match self {
            RouteError::Http(err) => err.into_response(),
            RouteError::Unhandled(err) => {
                tracing::error!(error = %err, "unhandled error in route handler");
                if production {
                    HttpError::from_status(StatusCode::INTERNAL_SERVER_ERROR).into_response()
                } else {
                    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                        .into_response()
                }
            }
        }
    }

    /// The JSON document written into a `$error` frame.
    pub(crate) fn to_frame_json(&self, production: bool) -> serde_json::Value {
        match self {
            RouteError::Http(err) => {
                let mut body = err.to_json().unwrap_or_else(|| json!({}));
                if let Some(map) = body.as_object_mut() {
                    map.insert("status".to_string(), err.status().as_u16().into());
                }
                body
            }
            RouteError::Unhandled(err) => {
                tracing::error!(error = %err, "unhandled error in json-seq stream");
                if production {
                    json!({ "status": 500 })
                } else {
                    json!({ "status": 500, "message": err.to_string() })
                }
            }
        }
    }
}

impl std::fmt::Debug for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::Http(err) => f.debug_tuple("Http").field(err).finish(),
            RouteError::Unhandled(err) => f.debug_tuple("Unhandled").field(err).finish(),
        }
    }
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::Http(err) => write!(
                f,
                "{}: {}",
                err.status(),
                err.message().unwrap_or("no message")
            ),
            RouteError::Unhandled(err) => write!(f, "{err}"),
        }
    }
}

impl From<HttpError> for RouteError {
    fn from(err: HttpError) -> Self {
        RouteError::Http(err)
    }
}

impl<E> From<E> for RouteError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        RouteError::Unhandled(Box::new(err))
    }
}

/// A route table that could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid path pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("duplicate route name {0:?}")]
    DuplicateName(String),
}

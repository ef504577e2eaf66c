//! Cross-origin resource sharing.
//!
//! Every request carrying an `Origin` header is checked against the
//! dispatcher's [`CorsConfig`]:
//!
//! - a trusted origin is echoed back with credentials allowed,
//! - an allowed origin is echoed back without credentials,
//! - any other origin is rejected with 403.
//!
//! Requests without an `Origin` header get `*` when any origin is allowed,
//! and the first configured origin otherwise.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::Response;

use crate::error::HttpError;

/// Default `Access-Control-Max-Age` for preflight responses.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Origins allowed to make uncredentialed requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AllowedOrigins {
    #[default]
    Any,
    List(Vec<String>),
}

/// CORS policy of a dispatcher.
///
/// ```rust
/// use pathrpc_axum::CorsConfig;
///
/// let cors = CorsConfig::new()
///     .allow_origins(["https://example.com"])
///     .trust_origins(["https://admin.example.com"])
///     .allow_headers(["content-type", "authorization"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    allowed: AllowedOrigins,
    trusted: Vec<String>,
    /// Empty echoes `Access-Control-Request-Headers` back.
    headers: Vec<String>,
    max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed: AllowedOrigins::Any,
            trusted: Vec::new(),
            headers: Vec::new(),
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl CorsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict uncredentialed access to these origins.
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = AllowedOrigins::List(origins.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_any_origin(mut self) -> Self {
        self.allowed = AllowedOrigins::Any;
        self
    }

    /// Origins allowed to send credentials.
    pub fn trust_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed
    }

    pub fn trusted_origins(&self) -> &[String] {
        &self.trusted
    }

    /// Decide how to answer a request with these headers.
    pub(crate) fn resolve(&self, headers: &HeaderMap) -> Result<CorsPolicy, HttpError> {
        let Some(origin) = headers.get(header::ORIGIN) else {
            return Ok(self.without_origin());
        };
        let Ok(origin_str) = origin.to_str() else {
            tracing::warn!("rejected request with a non-ASCII origin");
            return Err(HttpError::forbidden("origin not allowed"));
        };

        let credentials = if self.trusted.iter().any(|o| o == origin_str) {
            true
        } else {
            match &self.allowed {
                AllowedOrigins::Any => false,
                AllowedOrigins::List(list) if list.iter().any(|o| o == origin_str) => false,
                AllowedOrigins::List(_) => {
                    tracing::warn!(origin = origin_str, "rejected request from disallowed origin");
                    return Err(HttpError::forbidden("origin not allowed"));
                }
            }
        };
        Ok(CorsPolicy {
            origin: Some(origin.clone()),
            credentials,
        })
    }

    fn without_origin(&self) -> CorsPolicy {
        let (origin, credentials) = match &self.allowed {
            AllowedOrigins::Any => (Some(HeaderValue::from_static("*")), false),
            AllowedOrigins::List(list) => match (list.first(), self.trusted.first()) {
                (Some(allowed), _) => (HeaderValue::from_str(allowed).ok(), false),
                (None, Some(trusted)) => (HeaderValue::from_str(trusted).ok(), true),
                (None, None) => (None, false),
            },
        };
        CorsPolicy {
            origin,
            credentials,
        }
    }

    /// Answer a preflight request.
    pub(crate) fn preflight(
        &self,
        policy: &CorsPolicy,
        methods: &[Method],
        request_headers: &HeaderMap,
    ) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();

        let methods = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }

        let allowed_headers = if self.headers.is_empty() {
            request_headers
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
        } else {
            HeaderValue::from_str(&self.headers.join(", ")).ok()
        };
        if let Some(value) = allowed_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        }

        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(self.max_age.as_secs()),
        );
        policy.apply(headers);
        response
    }
}

/// The CORS headers owed to one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CorsPolicy {
    /// `None` only when no origin is configured at all.
    origin: Option<HeaderValue>,
    credentials: bool,
}

impl CorsPolicy {
    pub(crate) fn apply(&self, headers: &mut HeaderMap) {
        let Some(origin) = &self.origin else {
            return;
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static(if self.credentials { "true" } else { "false" }),
        );
        if origin != "*" {
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
    }
}

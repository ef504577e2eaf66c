//! Per-request context handed to route handlers.

use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;

/// The request a handler is serving, plus a builder for the response head.
///
/// Cloning is cheap; all clones share the same response builder, so a
/// json-seq handler may keep a clone inside its stream.
#[derive(Clone, Debug)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: String,
    response: Mutex<ResponseHead>,
}

#[derive(Debug, Default)]
struct ResponseHead {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl RequestContext {
    pub(crate) fn new(method: Method, uri: Uri, headers: HeaderMap, route: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                method,
                uri,
                headers,
                route: route.to_string(),
                response: Mutex::new(ResponseHead::default()),
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// The full request URI, including any dispatcher prefix.
    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Name of the route being served.
    pub fn route(&self) -> &str {
        &self.inner.route
    }

    /// Override the status of a successful response.
    pub fn set_status(&self, status: StatusCode) {
        self.head().status = Some(status);
    }

    /// Set a response header, replacing earlier values. Invalid names or
    /// values are dropped.
    pub fn set_header<K, V>(&self, key: K, value: V)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (key, value) = (key.as_ref(), value.as_ref());
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.head().headers.insert(name, value);
            }
            _ => tracing::debug!(key, value, "invalid response header, header dropped"),
        }
    }

    /// Apply the status and headers set by the handler.
    pub(crate) fn apply(&self, response: &mut Response) {
        let mut head = self.head();
        if let Some(status) = head.status {
            *response.status_mut() = status;
        }
        for (name, value) in head.headers.drain() {
            if let Some(name) = name {
                response.headers_mut().insert(name, value);
            }
        }
    }

    fn head(&self) -> std::sync::MutexGuard<'_, ResponseHead> {
        self.inner
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

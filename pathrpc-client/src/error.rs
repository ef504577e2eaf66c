//! Client-side error type.

use http::StatusCode;

/// Errors returned by [`Client`](crate::Client) calls.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status, or a json-seq stream
    /// ended with an error frame.
    #[error("server returned {status}: {}", message.as_deref().unwrap_or("no message"))]
    Status {
        status: StatusCode,
        message: Option<String>,
        body: Option<serde_json::Value>,
    },

    /// No route with this name.
    #[error("unknown route {0:?}")]
    UnknownRoute(String),

    /// A path parameter required by the route pattern was not supplied.
    #[error("route {route:?} requires path parameter {param:?}")]
    MissingParam { route: String, param: String },

    /// Transport-level error (connection failed, body read failed, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Request encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Response decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// Malformed json-seq framing.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Build a status error from a response body.
    ///
    /// The server writes `{"message": ..}` for most errors; anything else
    /// is kept as the raw body.
    pub fn from_body(status: StatusCode, body: Option<serde_json::Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(|message| message.as_str())
            .map(str::to_string);
        ClientError::Status {
            status,
            message,
            body,
        }
    }

    /// The HTTP status, for [`Status`](Self::Status) errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::Status { message, .. } => message.as_deref(),
            ClientError::Transport(msg)
            | ClientError::Encode(msg)
            | ClientError::Decode(msg)
            | ClientError::Protocol(msg) => Some(msg),
            ClientError::UnknownRoute(_) | ClientError::MissingParam { .. } => None,
        }
    }

    /// The JSON body of a [`Status`](Self::Status) error.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            ClientError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

impl From<pathrpc_core::EncodeError> for ClientError {
    fn from(err: pathrpc_core::EncodeError) -> Self {
        ClientError::Encode(err.to_string())
    }
}

impl From<pathrpc_core::FrameError> for ClientError {
    fn from(err: pathrpc_core::FrameError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

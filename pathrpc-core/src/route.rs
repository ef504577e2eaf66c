//! Route metadata shared by the server and the client.

use http::Method;

/// How a route's result is written to the response body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    /// One JSON document.
    #[default]
    Json,
    /// A JSON text sequence, optionally ending in pagination links.
    JsonSeq,
    /// The handler builds the whole response.
    Raw,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Json => "json",
            ResultFormat::JsonSeq => "json-seq",
            ResultFormat::Raw => "raw",
        }
    }
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request data travels in the query string of bodyless methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Every field is a plain string: `?name=value`.
    Plain,
    /// Values use the query codec: `?filter=(tag:'new')`.
    #[default]
    Codec,
}

/// Public description of a route, enough for a client to call it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub format: ResultFormat,
    pub query: QueryMode,
}

impl RouteSpec {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            format: ResultFormat::default(),
            query: QueryMode::default(),
        }
    }

    pub fn format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    pub fn query(mut self, query: QueryMode) -> Self {
        self.query = query;
        self
    }

    /// Whether request data travels in the body rather than the query.
    pub fn has_body(&self) -> bool {
        method_has_body(&self.method)
    }
}

/// `PATCH`, `POST` and `PUT` carry their data as a JSON body.
pub fn method_has_body(method: &Method) -> bool {
    matches!(*method, Method::PATCH | Method::POST | Method::PUT)
}

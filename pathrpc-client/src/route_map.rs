//! Route name to request builder table.
//!
//! Each [`RouteSpec`] is compiled once into a closure that turns path
//! parameters and request data into an [`http::Request`]:
//!
//! - path parameters fill the pattern (`/posts/:id` + `{id: 7}` gives
//!   `/posts/7`); an optional group is written only when every parameter
//!   inside it is present,
//! - data travels as a JSON body for `PATCH`/`POST`/`PUT` and in the query
//!   string otherwise, codec-encoded or plain per the route.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, header};
use http_body_util::Full;
use pathrpc_core::path::lex;
use pathrpc_core::{Object, PathToken, PatternError, QueryMode, RouteSpec, Value, query};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::form_urlencoded;

use crate::error::ClientError;

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

type BuildRequest =
    Arc<dyn Fn(&str, &Object, &Object) -> Result<Request<Full<Bytes>>, ClientError> + Send + Sync>;

/// Compiled request builders, keyed by route name.
#[derive(Clone, Default)]
pub struct RouteMap {
    routes: HashMap<String, (RouteSpec, BuildRequest)>,
}

impl std::fmt::Debug for RouteMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.routes.keys()).finish()
    }
}

impl RouteMap {
    /// Compile `specs`, with every path mounted under `prefix`.
    pub fn compile<'a, I>(specs: I, prefix: &str) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = &'a RouteSpec>,
    {
        let prefix = prefix.trim_end_matches('/').to_string();
        let mut routes = HashMap::new();
        for spec in specs {
            let tokens = lex(&spec.path)?;
            let build = builder(spec.clone(), prefix.clone(), tokens);
            routes.insert(spec.name.clone(), (spec.clone(), build));
        }
        Ok(Self { routes })
    }

    pub fn spec(&self, name: &str) -> Option<&RouteSpec> {
        self.routes.get(name).map(|(spec, _)| spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Build the request for route `name`. `origin` (e.g.
    /// `http://localhost:3000`) is prepended to the path.
    pub fn request(
        &self,
        name: &str,
        origin: &str,
        params: &Object,
        data: &Object,
    ) -> Result<Request<Full<Bytes>>, ClientError> {
        let (_, build) = self
            .routes
            .get(name)
            .ok_or_else(|| ClientError::UnknownRoute(name.to_string()))?;
        build(origin, params, data)
    }
}

fn builder(spec: RouteSpec, prefix: String, tokens: Vec<PathToken>) -> BuildRequest {
    let param_names = PathToken::param_names(&tokens);
    Arc::new(move |origin: &str, params: &Object, data: &Object| {
        let mut uri = format!("{origin}{prefix}");
        let mut missing = None;
        if !write_path(&tokens, params, &mut uri, &mut missing) {
            return Err(ClientError::MissingParam {
                route: spec.name.clone(),
                param: missing.unwrap_or_default(),
            });
        }

        let builder = Request::builder().method(spec.method.clone());
        let request = if spec.has_body() {
            let body = serde_json::to_vec(&serde_json::Value::from(Value::Object(data.clone())))
                .map_err(|err| ClientError::Encode(err.to_string()))?;
            builder
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body)))
        } else {
            let skip: Vec<&str> = param_names.iter().map(String::as_str).collect();
            let query = match spec.query {
                QueryMode::Codec => query::encode(data, &skip),
                QueryMode::Plain => plain_query(data, &skip),
            };
            if !query.is_empty() {
                uri.push('?');
                uri.push_str(&query);
            }
            builder.uri(uri).body(Full::new(Bytes::new()))
        };
        request.map_err(|err| ClientError::Encode(err.to_string()))
    })
}

/// Append the path for `tokens`. Returns false, naming the parameter in
/// `missing`, when a required parameter is absent.
fn write_path(
    tokens: &[PathToken],
    params: &Object,
    out: &mut String,
    missing: &mut Option<String>,
) -> bool {
    for token in tokens {
        match token {
            PathToken::Text(text) => out.push_str(text),
            PathToken::Param(name) => match params.get(name) {
                Some(value) if !value.is_null() => push_segment(out, &value.to_plain_string()),
                _ => {
                    *missing = Some(name.clone());
                    return false;
                }
            },
            PathToken::Wildcard(name) => {
                let name = name.as_deref().unwrap_or(pathrpc_core::path::BARE_WILDCARD);
                match params.get(name) {
                    Some(Value::Array(items)) => {
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                out.push('/');
                            }
                            let item = item.as_ref().map(Value::to_plain_string).unwrap_or_default();
                            push_segment(out, &item);
                        }
                    }
                    Some(Value::String(path)) => {
                        for (i, segment) in path.split('/').enumerate() {
                            if i > 0 {
                                out.push('/');
                            }
                            push_segment(out, segment);
                        }
                    }
                    Some(value) if !value.is_null() => push_segment(out, &value.to_plain_string()),
                    _ => {
                        *missing = Some(name.to_string());
                        return false;
                    }
                }
            }
            PathToken::Group(inner) => {
                let mut group = String::new();
                let mut ignored = None;
                if write_path(inner, params, &mut group, &mut ignored) {
                    out.push_str(&group);
                }
            }
        }
    }
    true
}

fn push_segment(out: &mut String, segment: &str) {
    out.extend(utf8_percent_encode(segment, SEGMENT));
}

/// Plain query: scalars as strings, arrays as repeated keys.
fn plain_query(data: &Object, skip: &[&str]) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in data {
        if skip.contains(&key.as_str()) {
            continue;
        }
        match value {
            Value::Array(items) => {
                for item in items.iter().flatten() {
                    out.append_pair(key, &item.to_plain_string());
                }
            }
            other => {
                out.append_pair(key, &other.to_plain_string());
            }
        }
    }
    out.finish()
}

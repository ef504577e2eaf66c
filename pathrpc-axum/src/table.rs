//! Compiled route tables.
//!
//! Routes are grouped by method and each group gets one [`Matcher`]. `GET`
//! routes also answer `HEAD`. A table is immutable once compiled; reloading
//! builds a new one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::Method;
use pathrpc_core::path::lex;
use pathrpc_core::{Matcher, PathToken, RouteSpec};

use crate::error::BuildError;
use crate::route::Route;

/// A route with everything derived from its declaration.
#[derive(Debug)]
pub(crate) struct CompiledRoute {
    pub spec: RouteSpec,
    pub route: Route,
    /// Parameter names in pattern order.
    pub param_names: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct MethodGroup {
    pub matcher: Matcher,
    /// Indexed like the matcher's patterns.
    pub routes: Vec<Arc<CompiledRoute>>,
}

/// All routes served by a dispatcher.
#[derive(Debug, Default)]
pub struct RouteTable {
    groups: HashMap<Method, MethodGroup>,
    specs: Vec<RouteSpec>,
}

impl RouteTable {
    /// Compile `routes`. Fails on an invalid pattern or a repeated name.
    pub fn compile(routes: Vec<Route>) -> Result<Self, BuildError> {
        let mut names = HashSet::new();
        let mut by_method: Vec<(Method, Vec<Arc<CompiledRoute>>)> = Vec::new();
        let mut specs = Vec::with_capacity(routes.len());

        for route in routes {
            let name = route
                .name
                .clone()
                .unwrap_or_else(|| format!("{} {}", route.method, route.path));
            if !names.insert(name.clone()) {
                return Err(BuildError::DuplicateName(name));
            }
            let spec = RouteSpec::new(name, route.method.clone(), route.path.clone())
                .format(route.format)
                .query(route.query);
            specs.push(spec.clone());

            let tokens = lex(&route.path)?;
            let compiled = Arc::new(CompiledRoute {
                spec,
                param_names: PathToken::param_names(&tokens),
                route,
            });
            let method = compiled.route.method.clone();
            let mut targets = vec![method.clone()];
            if method == Method::GET {
                targets.push(Method::HEAD);
            }
            for target in targets {
                match by_method.iter_mut().find(|(m, _)| *m == target) {
                    Some((_, group)) => group.push(compiled.clone()),
                    None => by_method.push((target, vec![compiled.clone()])),
                }
            }
        }

        let mut groups = HashMap::with_capacity(by_method.len());
        for (method, routes) in by_method {
            let matcher = Matcher::compile(routes.iter().map(|r| r.route.path.as_str()))?;
            tracing::debug!(%method, routes = matcher.len(), "compiled method group");
            groups.insert(method, MethodGroup { matcher, routes });
        }

        Ok(Self { groups, specs })
    }

    /// Descriptions of every route, in declaration order.
    pub fn specs(&self) -> &[RouteSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub(crate) fn group(&self, method: &Method) -> Option<&MethodGroup> {
        self.groups.get(method)
    }

    /// Methods with at least one route matching `path`, sorted by name.
    pub fn methods_matching(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .groups
            .iter()
            .filter(|(_, group)| group.matcher.matches(path).next().is_some())
            .map(|(method, _)| method.clone())
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

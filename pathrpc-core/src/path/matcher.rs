use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;

use percent_encoding::percent_decode_str;
use regex::Regex;

use super::{BARE_WILDCARD, ParamValue, Params, PathToken, lex};
use crate::error::PatternError;

/// One candidate produced by [`Matcher::matches`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<'a> {
    /// Index of the pattern in the list passed to [`Matcher::compile`].
    pub index: usize,
    pub params: Params<'a>,
}

/// A compiled set of path patterns.
///
/// Patterns without parameters are looked up in a hash map. The rest are
/// grouped by their leading literal text, and each group is ordered so that
/// more specific patterns are offered first.
#[derive(Debug, Default)]
pub struct Matcher {
    patterns: Vec<Vec<PathToken>>,
    fixed: HashMap<String, Vec<usize>>,
    dynamic: Vec<Dynamic>,
    buckets: Vec<Bucket>,
    /// Selects a bucket: one capture group per bucket, longest prefix first.
    prefixes: Option<Regex>,
}

#[derive(Debug)]
struct Dynamic {
    index: usize,
    prefix_len: usize,
    regex: Regex,
    captures: Vec<Capture>,
}

#[derive(Debug)]
struct Capture {
    name: String,
    wildcard: bool,
}

#[derive(Debug)]
struct Bucket {
    prefix: String,
    /// Indices into `Matcher::dynamic`, in priority order.
    entries: Vec<usize>,
}

impl Matcher {
    /// Compile `patterns`. Match results refer to patterns by their position
    /// in this list.
    pub fn compile<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Matcher::default();
        for (index, pattern) in patterns.into_iter().enumerate() {
            let pattern = pattern.as_ref();
            let tokens = lex(pattern)?;
            match tokens.as_slice() {
                [] => matcher.fixed.entry(String::new()).or_default().push(index),
                [PathToken::Text(text)] => {
                    matcher.fixed.entry(text.clone()).or_default().push(index)
                }
                _ => {
                    let dynamic = Dynamic::compile(index, pattern, &tokens)?;
                    matcher.dynamic.push(dynamic);
                }
            }
            matcher.patterns.push(tokens);
        }
        let prefixes = dynamic_prefixes(&matcher);
        matcher.build_buckets(&prefixes)?;
        Ok(matcher)
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Tokens of the pattern at `index`.
    pub fn tokens(&self, index: usize) -> Option<&[PathToken]> {
        self.patterns.get(index).map(Vec::as_slice)
    }

    /// All candidates for `path`, in priority order.
    pub fn matches<'a>(&'a self, path: &'a str) -> impl Iterator<Item = Match<'a>> + 'a {
        let fixed = self
            .fixed
            .get(path)
            .into_iter()
            .flatten()
            .map(|&index| Match {
                index,
                params: Params::default(),
            });
        let dynamic = self
            .bucket_for(path)
            .into_iter()
            .flat_map(|bucket| bucket.entries.iter())
            .filter_map(move |&entry| self.dynamic[entry].captures(path));
        fixed.chain(dynamic)
    }

    /// Offer each candidate to `visit` until it returns `Some`.
    pub fn find<'a, R, F>(&'a self, path: &'a str, mut visit: F) -> Option<R>
    where
        F: FnMut(usize, Params<'a>) -> Option<R>,
    {
        self.matches(path).find_map(|m| visit(m.index, m.params))
    }

    /// Like [`find`](Self::find), awaiting each candidate before trying the
    /// next one.
    pub async fn find_async<'a, R, F, Fut>(&'a self, path: &'a str, mut visit: F) -> Option<R>
    where
        F: FnMut(usize, Params<'a>) -> Fut,
        Fut: Future<Output = Option<R>>,
    {
        for candidate in self.matches(path) {
            if let Some(result) = visit(candidate.index, candidate.params).await {
                return Some(result);
            }
        }
        None
    }

    fn bucket_for(&self, path: &str) -> Option<&Bucket> {
        let captures = self.prefixes.as_ref()?.captures(path)?;
        let group = (1..captures.len()).find(|&i| captures.get(i).is_some())?;
        self.buckets.get(group - 1)
    }

    fn build_buckets(&mut self, prefixes: &[String]) -> Result<(), PatternError> {
        let mut buckets: Vec<Bucket> = prefixes
            .iter()
            .map(|prefix| Bucket {
                prefix: prefix.clone(),
                entries: Vec::new(),
            })
            .collect();

        for (entry, dynamic) in self.dynamic.iter().enumerate() {
            let tokens = &self.patterns[dynamic.index];
            let prefix = leading_text(tokens);
            let absorbs = first_dynamic(tokens)
                .is_some_and(|t| matches!(t, PathToken::Wildcard(_) | PathToken::Group(_)));
            for bucket in &mut buckets {
                let own = bucket.prefix == prefix;
                // A leading wildcard or optional group can also cover any
                // longer literal prefix.
                let extended = absorbs && bucket.prefix.starts_with(prefix);
                if own || extended {
                    bucket.entries.push(entry);
                }
            }
        }

        for bucket in &mut buckets {
            bucket.entries.sort_by(|&a, &b| {
                specificity(
                    &self.patterns[self.dynamic[a].index],
                    &self.patterns[self.dynamic[b].index],
                )
            });
        }

        if !buckets.is_empty() {
            let alternatives: Vec<String> = buckets
                .iter()
                .map(|bucket| format!("({})", regex::escape(&bucket.prefix)))
                .collect();
            let source = format!("^(?:{})", alternatives.join("|"));
            let regex = Regex::new(&source).map_err(|err| PatternError::Regex {
                pattern: source.clone(),
                message: err.to_string(),
            })?;
            self.prefixes = Some(regex);
        }
        self.buckets = buckets;
        Ok(())
    }
}

/// Distinct dynamic prefixes, longest first.
fn dynamic_prefixes(matcher: &Matcher) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for dynamic in &matcher.dynamic {
        let prefix = leading_text(&matcher.patterns[dynamic.index]);
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    prefixes.sort_by(|a, b| b.len().cmp(&a.len()));
    prefixes
}

fn leading_text(tokens: &[PathToken]) -> &str {
    match tokens.first() {
        Some(PathToken::Text(text)) => text,
        _ => "",
    }
}

fn first_dynamic(tokens: &[PathToken]) -> Option<&PathToken> {
    tokens.iter().find(|token| !token.is_text())
}

impl Dynamic {
    fn compile(index: usize, pattern: &str, tokens: &[PathToken]) -> Result<Self, PatternError> {
        let prefix_len = leading_text(tokens).len();
        let rest = match tokens.first() {
            Some(PathToken::Text(_)) => &tokens[1..],
            _ => tokens,
        };

        let mut source = String::from("(?s)^");
        let mut captures = Vec::new();
        write_regex(rest, true, &mut source, &mut captures);
        source.push('$');

        let regex = Regex::new(&source).map_err(|err| PatternError::Regex {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            index,
            prefix_len,
            regex,
            captures,
        })
    }

    fn captures<'a>(&'a self, path: &'a str) -> Option<Match<'a>> {
        let rest = path.get(self.prefix_len..)?;
        let found = self.regex.captures(rest)?;
        let mut params = Params::default();
        for (capture, group) in self.captures.iter().zip(found.iter().skip(1)) {
            // Captures inside an optional group that did not participate.
            let Some(group) = group else { continue };
            let value = if capture.wildcard {
                let text = group.as_str();
                let segments = if text.is_empty() {
                    Vec::new()
                } else {
                    text.split('/').map(decode).collect()
                };
                ParamValue::Many(segments)
            } else {
                ParamValue::One(decode(group.as_str()))
            };
            params.push(&capture.name, value);
        }
        Some(Match {
            index: self.index,
            params,
        })
    }
}

fn write_regex(tokens: &[PathToken], top_level: bool, out: &mut String, captures: &mut Vec<Capture>) {
    for (i, token) in tokens.iter().enumerate() {
        match token {
            PathToken::Text(text) => out.push_str(&regex::escape(text)),
            PathToken::Param(name) => {
                out.push_str("([^/]+)");
                captures.push(Capture {
                    name: name.clone(),
                    wildcard: false,
                });
            }
            PathToken::Wildcard(name) => {
                let terminal = top_level && i + 1 == tokens.len();
                out.push_str(if name.is_none() && terminal { "(.*)" } else { "(.+)" });
                captures.push(Capture {
                    name: name.clone().unwrap_or_else(|| BARE_WILDCARD.to_string()),
                    wildcard: true,
                });
            }
            PathToken::Group(inner) => {
                out.push_str("(?:");
                write_regex(inner, false, out, captures);
                out.push_str(")?");
            }
        }
    }
}

fn decode(segment: &str) -> Cow<'_, str> {
    percent_decode_str(segment)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(segment))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Param,
    Wildcard,
    Group,
}

fn kind(token: &PathToken) -> Kind {
    match token {
        PathToken::Text(_) => Kind::Text,
        PathToken::Param(_) => Kind::Param,
        PathToken::Wildcard(_) => Kind::Wildcard,
        PathToken::Group(_) => Kind::Group,
    }
}

fn separators(tokens: &[PathToken]) -> usize {
    tokens
        .iter()
        .map(|token| match token {
            PathToken::Text(text) => text.matches('/').count(),
            PathToken::Group(inner) => separators(inner),
            _ => 0,
        })
        .sum()
}

/// Priority order of two dynamic patterns. `Less` means `a` is tried first.
fn specificity(a: &[PathToken], b: &[PathToken]) -> Ordering {
    separators(b)
        .cmp(&separators(a))
        .then_with(|| {
            let differing = a.iter().zip(b).map(|(x, y)| (kind(x), kind(y))).find(|(x, y)| x != y);
            match differing {
                Some((Kind::Param, Kind::Wildcard)) => Ordering::Less,
                Some((Kind::Wildcard, Kind::Param)) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        })
        .then_with(|| b.len().cmp(&a.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn indices(matcher: &Matcher, path: &str) -> Vec<usize> {
        matcher.matches(path).map(|m| m.index).collect()
    }

    fn one(value: &str) -> ParamValue<'_> {
        ParamValue::One(Cow::Borrowed(value))
    }

    fn many<'a>(values: &[&'a str]) -> ParamValue<'a> {
        ParamValue::Many(values.iter().map(|v| Cow::Borrowed(*v)).collect())
    }

    #[test]
    fn test_empty_matcher_never_matches() {
        let matcher = Matcher::compile(Vec::<&str>::new()).unwrap();
        assert!(matcher.is_empty());
        assert_eq!(indices(&matcher, "/"), Vec::<usize>::new());
        assert_eq!(matcher.find("/x", |i, _| Some(i)), None);
    }

    #[test]
    fn test_fixed_before_catch_all() {
        let matcher = Matcher::compile(["/", "/*", "/foo"]).unwrap();
        assert_eq!(indices(&matcher, "/"), [0, 1]);
        assert_eq!(indices(&matcher, "/foo"), [2, 1]);
        assert_eq!(indices(&matcher, "/foo/bar"), [1]);

        let catch_all = matcher.matches("/foo/bar").next().unwrap();
        assert_eq!(catch_all.params.get("*"), Some(&many(&["foo", "bar"])));
        let root = matcher.matches("/").nth(1).unwrap();
        assert_eq!(root.params.get("*"), Some(&many(&[])));
    }

    #[test]
    fn test_specificity_order() {
        let matcher =
            Matcher::compile(["/a/:b", "/a/:b/c", "/a/b/:c", "/a/*b", "/a/b/*c"]).unwrap();

        let hits: Vec<Match<'_>> = matcher.matches("/a/b").collect();
        assert_eq!(hits.iter().map(|m| m.index).collect::<Vec<_>>(), [0, 3]);
        assert_eq!(hits[0].params.get("b"), Some(&one("b")));
        assert_eq!(hits[1].params.get("b"), Some(&many(&["b"])));

        let hits: Vec<Match<'_>> = matcher.matches("/a/b/c").collect();
        assert_eq!(hits.iter().map(|m| m.index).collect::<Vec<_>>(), [2, 4, 3]);
        assert_eq!(hits[0].params.get("c"), Some(&one("c")));
        assert_eq!(hits[1].params.get("c"), Some(&many(&["c"])));
        assert_eq!(hits[2].params.get("b"), Some(&many(&["b", "c"])));
    }

    #[test]
    fn test_shared_literal_path() {
        let matcher = Matcher::compile(["/ping", "/ping"]).unwrap();
        assert_eq!(indices(&matcher, "/ping"), [0, 1]);
    }

    #[test]
    fn test_unknown_prefix_short_circuits() {
        let matcher = Matcher::compile(["/users/:id"]).unwrap();
        assert_eq!(indices(&matcher, "/posts/1"), Vec::<usize>::new());
        assert_eq!(indices(&matcher, "/users/"), Vec::<usize>::new());
        assert_eq!(indices(&matcher, "/users/1/extra"), Vec::<usize>::new());
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let matcher = Matcher::compile(["/files/:name", "/tree/*path"]).unwrap();
        let hit = matcher.matches("/files/a%20b").next().unwrap();
        assert_eq!(hit.params.get("name").and_then(ParamValue::as_str), Some("a b"));
        let hit = matcher.matches("/tree/x%2Fy/z").next().unwrap();
        assert_eq!(hit.params.get("path"), Some(&many(&["x/y", "z"])));
        let hit = matcher.matches("/files/plain").next().unwrap();
        assert!(matches!(hit.params.get("name"), Some(ParamValue::One(Cow::Borrowed("plain")))));
    }

    #[test]
    fn test_optional_group() {
        let matcher = Matcher::compile(["/posts{/:slug}"]).unwrap();
        let bare = matcher.matches("/posts").next().unwrap();
        assert!(bare.params.is_empty());
        let slug = matcher.matches("/posts/hello").next().unwrap();
        assert_eq!(slug.params.get("slug"), Some(&one("hello")));
    }

    #[test]
    fn test_optional_group_beside_longer_prefix() {
        let matcher = Matcher::compile(["/posts{/:slug}", "/posts/:id/comments"]).unwrap();
        assert_eq!(indices(&matcher, "/posts/hello"), [0]);
        assert_eq!(indices(&matcher, "/posts"), [0]);
        assert_eq!(indices(&matcher, "/posts/7/comments"), [1]);
        let slug = matcher.matches("/posts/hello").next().unwrap();
        assert_eq!(slug.params.get("slug"), Some(&one("hello")));

        let matcher = Matcher::compile(["/docs{/*rest}", "/docs/:page/edit"]).unwrap();
        assert_eq!(indices(&matcher, "/docs/a/b"), [0]);
        assert_eq!(indices(&matcher, "/docs/a/edit"), [1, 0]);
    }

    #[test]
    fn test_find_stops_at_first_some() {
        let matcher = Matcher::compile(["/a/:b", "/a/*b"]).unwrap();
        let mut visited = Vec::new();
        let found = matcher.find("/a/x", |index, _| {
            visited.push(index);
            (index == 0).then_some("param")
        });
        assert_eq!(found, Some("param"));
        assert_eq!(visited, [0]);
    }

    #[test]
    fn test_find_async_awaits_in_order() {
        let matcher = Matcher::compile(["/a/:b", "/a/*b"]).unwrap();
        let mut visited = Vec::new();
        let found = block_on(matcher.find_async("/a/x", |index, params| {
            visited.push(index);
            let wildcard = matches!(params.get("b"), Some(ParamValue::Many(_)));
            async move { wildcard.then_some(index) }
        }));
        assert_eq!(found, Some(1));
        assert_eq!(visited, [0, 1]);
    }

    #[test]
    fn test_compile_reports_pattern_errors() {
        let err = Matcher::compile(["/ok", "/bad:id"]).unwrap_err();
        assert!(matches!(err, PatternError::NotPrecededBySeparator { position: 4, .. }));
    }
}

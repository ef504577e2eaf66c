//! A small in-memory blog used by the example binaries.
//!
//! `blog-server` serves [`routes`]; `blog-client` calls the same routes by
//! name through `pathrpc-client`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use pathrpc_axum::ValidationError;
use pathrpc_axum::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const DEFAULT_PAGE_SIZE: usize = 2;
pub const MAX_PAGE_SIZE: usize = 50;

/// Address to listen on; the port comes from `PORT`, default 3000.
pub fn server_addr() -> SocketAddr {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3000);
    SocketAddr::from(([0, 0, 0, 0], port))
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub year: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostId {
    pub id: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewPost {
    pub title: String,
    pub year: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListPosts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Cursor {
    after: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Search {
    pub q: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Archive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FilePath {
    pub path: Vec<String>,
}

type PostItem = Result<Yield<Post, Cursor>, RouteError>;

#[derive(Clone, Debug, Default)]
pub struct Store {
    posts: Arc<RwLock<BTreeMap<u64, Post>>>,
}

impl Store {
    pub fn seeded() -> Self {
        let posts = [
            (1, "Hello pathrpc", 2023, &["intro"][..]),
            (2, "Path patterns", 2024, &["routing"][..]),
            (3, "Query strings", 2024, &["routing", "codec"][..]),
            (4, "Streaming results", 2025, &["json-seq"][..]),
        ]
        .into_iter()
        .map(|(id, title, year, tags)| {
            let post = Post {
                id,
                title: title.to_string(),
                year,
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
            };
            (id, post)
        })
        .collect();
        Self {
            posts: Arc::new(RwLock::new(posts)),
        }
    }

    pub async fn get(&self, id: u64) -> Option<Post> {
        self.posts.read().await.get(&id).cloned()
    }

    pub async fn insert(&self, new: NewPost) -> Post {
        let mut posts = self.posts.write().await;
        let id = posts.keys().next_back().map_or(1, |last| last + 1);
        let post = Post {
            id,
            title: new.title,
            year: new.year,
            tags: new.tags,
        };
        posts.insert(id, post.clone());
        post
    }

    pub async fn remove(&self, id: u64) -> Option<Post> {
        self.posts.write().await.remove(&id)
    }

    /// Posts with an id greater than `after`, in id order.
    pub async fn list(&self, tag: Option<&str>, after: Option<u64>, limit: usize) -> Vec<Post> {
        let posts = self.posts.read().await;
        let start = after.map_or(0, |after| after + 1);
        posts
            .range(start..)
            .map(|(_, post)| post)
            .filter(|post| tag.is_none_or(|tag| post.tags.iter().any(|t| t == tag)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn filter<F: Fn(&Post) -> bool>(&self, keep: F) -> Vec<Post> {
        let posts = self.posts.read().await;
        posts.values().filter(|post| keep(post)).cloned().collect()
    }
}

fn check_new_post(value: &serde_json::Value) -> Result<(), ValidationError> {
    let mut error = ValidationError::new("invalid post");
    let mut failed = false;
    if value["title"].as_str().is_none_or(|title| title.trim().is_empty()) {
        error = error.push(ValidationError::new("title must not be empty").with_path("/title"));
        failed = true;
    }
    if let Some(year) = value["year"].as_u64() {
        if !(1970..=9999).contains(&year) {
            error = error.push(
                ValidationError::new("year out of range")
                    .with_path("/year")
                    .with_value(value["year"].clone()),
            );
            failed = true;
        }
    }
    if failed { Err(error) } else { Ok(()) }
}

/// Every route of the blog, bound to `store`.
pub fn routes(store: Store) -> Vec<Route> {
    let get_store = store.clone();
    let list_store = store.clone();
    let create_store = store.clone();
    let delete_store = store.clone();
    let search_store = store.clone();
    let archive_store = store.clone();
    let export_store = store;

    vec![
        Route::get("/posts/:id")
            .name("getPost")
            .json(move |p: PostId, _: (), _ctx| {
                let store = get_store.clone();
                async move {
                    let post = store.get(p.id).await;
                    post.ok_or_else(|| {
                        RouteError::from(HttpError::not_found(format!("no post {}", p.id)))
                    })
                }
            }),
        Route::get("/posts")
            .name("listPosts")
            .json_seq(move |_: (), q: ListPosts, _ctx| {
                let store = list_store.clone();
                async move {
                    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
                    let mut posts = store.list(q.tag.as_deref(), q.after, limit + 1).await;
                    let more = posts.len() > limit;
                    posts.truncate(limit);
                    Ok::<_, RouteError>(async_stream::stream! {
                        let last = posts.last().map(|post| post.id);
                        for post in posts {
                            let item: PostItem = Ok(Yield::Next(post));
                            yield item;
                        }
                        if let (true, Some(after)) = (more, last) {
                            let page = Pagination::next(Cursor { after });
                            let item: PostItem = Ok(Yield::Return(page));
                            yield item;
                        }
                    })
                }
            }),
        Route::post("/posts")
            .name("createPost")
            .data_schema(check_new_post)
            .json(move |_: (), new: NewPost, ctx: RequestContext| {
                let store = create_store.clone();
                async move {
                    let post = store.insert(new).await;
                    ctx.set_status(StatusCode::CREATED);
                    ctx.set_header("location", format!("/posts/{}", post.id));
                    tracing::info!(id = post.id, "post created");
                    Ok::<_, RouteError>(post)
                }
            }),
        Route::delete("/posts/:id")
            .name("deletePost")
            .json(move |p: PostId, _: (), _ctx| {
                let store = delete_store.clone();
                async move {
                    match store.remove(p.id).await {
                        Some(_) => Ok(()),
                        None => Err(RouteError::from(HttpError::not_found(format!(
                            "no post {}",
                            p.id
                        )))),
                    }
                }
            }),
        Route::get("/search")
            .name("search")
            .plain_query()
            .json(move |_: (), s: Search, _ctx| {
                let store = search_store.clone();
                async move {
                    let needle = s.q.to_lowercase();
                    let posts = store
                        .filter(|post| post.title.to_lowercase().contains(&needle))
                        .await;
                    Ok::<_, RouteError>(posts)
                }
            }),
        Route::get("/archive{/:year}")
            .name("archive")
            .json(move |a: Archive, _: (), _ctx| {
                let store = archive_store.clone();
                async move {
                    let posts = store
                        .filter(|post| a.year.is_none_or(|year| post.year == year))
                        .await;
                    Ok::<_, RouteError>(posts)
                }
            }),
        Route::get("/files/*path")
            .name("file")
            .json(|f: FilePath, _: (), _ctx| async move {
                if f.path.iter().any(|segment| segment == "..") {
                    return Err(HttpError::bad_request("path escapes the file root").into());
                }
                Ok::<_, RouteError>(serde_json::json!({ "path": f.path.join("/") }))
            }),
        Route::get("/export.csv")
            .name("export")
            .raw(move |_: (), _: (), _ctx| {
                let store = export_store.clone();
                async move {
                    let mut csv = String::from("id,title,year\n");
                    for post in store.filter(|_| true).await {
                        csv.push_str(&format!("{},{:?},{}\n", post.id, post.title, post.year));
                    }
                    let mut response = Response::new(Body::from(csv));
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
                    Ok::<_, RouteError>(response)
                }
            }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        RouterBuilder::new()
            .routes(routes(Store::seeded()))
            .build()
            .unwrap()
            .into_router()
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_store_list_pages() {
        let store = Store::seeded();
        let ids: Vec<u64> = store.list(None, Some(1), 2).await.iter().map(|p| p.id).collect();
        assert_eq!(ids, [2, 3]);
        let ids: Vec<u64> = store
            .list(Some("routing"), None, 10)
            .await
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [2, 3]);
    }

    #[tokio::test]
    async fn test_store_insert_assigns_next_id() {
        let store = Store::seeded();
        let post = store
            .insert(NewPost {
                title: "New".into(),
                year: 2026,
                tags: vec![],
            })
            .await;
        assert_eq!(post.id, 5);
        assert_eq!(store.get(5).await, Some(post));
    }

    #[test]
    fn test_check_new_post() {
        assert!(check_new_post(&serde_json::json!({ "title": "ok", "year": 2024 })).is_ok());
        let err = check_new_post(&serde_json::json!({ "title": " ", "year": 12 })).unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_archive_optional_year() {
        let (status, body) = get("/archive").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(4));
        let (_, body) = get("/archive/2024").await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_file_wildcard() {
        let (status, body) = get("/files/docs/intro.md").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "path": "docs/intro.md" }));
    }

    #[tokio::test]
    async fn test_plain_search() {
        let (_, body) = get("/search?q=PATTERNS").await;
        assert_eq!(body[0]["id"], 2);
    }
}

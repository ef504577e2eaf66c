//! Calls the example blog by route name.
//!
//! Start `blog-server` first, then: cargo run --bin blog-client
//! Uses the same PORT and PATHRPC_PREFIX as the server.

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::Full;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use pathrpc_axum::{DispatcherConfig, RouteTable};
use pathrpc_client::{Client, ClientError};
use pathrpc_examples::{ListPosts, NewPost, Post, PostId, Search, Store, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // The client only needs the route specs, not the handlers.
    let table = RouteTable::compile(routes(Store::default()))?;
    let prefix = DispatcherConfig::from_env().prefix;
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());

    let http = HttpClient::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let client = Client::from_specs(http, table.specs(), &prefix)?
        .with_origin(format!("http://localhost:{port}"));

    let post: Post = client.call("getPost", &PostId { id: 1 }, &()).await?;
    println!("getPost: {post:?}");

    let created: Post = client
        .call(
            "createPost",
            &(),
            &NewPost {
                title: "Written by blog-client".into(),
                year: 2026,
                tags: vec!["client".into()],
            },
        )
        .await?;
    println!("createPost: {created:?}");

    match client
        .call::<Post, _, _>("createPost", &(), &serde_json::json!({ "title": "", "year": 1 }))
        .await
    {
        Err(err @ ClientError::Status { .. }) => {
            println!("createPost rejected: {err}");
            if let Some(body) = err.body() {
                println!("  details: {body}");
            }
        }
        other => println!("unexpected: {other:?}"),
    }

    let hits: Vec<Post> = client
        .call("search", &(), &Search { q: "path".into() })
        .await?;
    println!("search: {} hit(s)", hits.len());

    let all: Vec<Post> = client
        .pages("listPosts", &(), &ListPosts::default())
        .try_collect()
        .await?;
    println!("listPosts, all pages:");
    for post in &all {
        println!("  #{} {}", post.id, post.title);
    }

    client
        .call::<(), _, _>("deletePost", &PostId { id: created.id }, &())
        .await?;
    println!("deletePost: #{} removed", created.id);

    Ok(())
}

use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use futures::{StreamExt, TryStreamExt, stream};
use http_body_util::BodyExt;
use pathrpc_axum::prelude::*;
use pathrpc_client::{Client, ClientError, SeqItem};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Post {
    id: u64,
    title: String,
}

#[derive(Deserialize, Serialize)]
struct PostId {
    id: u64,
}

#[derive(Deserialize, Serialize)]
struct NewPost {
    title: String,
}

#[derive(Default, Deserialize, Serialize)]
struct PageQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(Serialize)]
struct Page {
    page: u32,
}

type Items = Vec<Result<Yield<u32, Page>, RouteError>>;

fn routes() -> Vec<Route> {
    vec![
        Route::get("/posts/:id")
            .name("getPost")
            .json(|p: PostId, _: (), _ctx| async move {
                if p.id == 0 {
                    return Err(HttpError::not_found("no such post").into());
                }
                Ok::<_, RouteError>(Post {
                    id: p.id,
                    title: format!("post {}", p.id),
                })
            }),
        Route::post("/posts")
            .name("createPost")
            .json(|_: (), post: NewPost, ctx: RequestContext| async move {
                ctx.set_status(StatusCode::CREATED);
                Ok::<_, RouteError>(Post {
                    id: 1,
                    title: post.title,
                })
            }),
        Route::delete("/posts/:id")
            .name("deletePost")
            .json(|_: PostId, _: (), _ctx| async move { Ok::<_, RouteError>(()) }),
        Route::get("/numbers")
            .name("numbers")
            .json_seq(|_: (), q: PageQuery, _ctx| async move {
                let items: Items = match q.page.unwrap_or(1) {
                    1 => vec![
                        Ok(Yield::Next(1)),
                        Ok(Yield::Next(2)),
                        Ok(Yield::Return(Pagination::next(Page { page: 2 }))),
                    ],
                    _ => vec![
                        Ok(Yield::Next(3)),
                        Ok(Yield::Return(Pagination::prev(Page { page: 1 }))),
                    ],
                };
                Ok::<_, RouteError>(stream::iter(items))
            }),
        Route::get("/failing")
            .name("failing")
            .json_seq(|_: (), _: (), _ctx| async move {
                let items: Items = vec![
                    Ok(Yield::Next(1)),
                    Err(HttpError::bad_request("page token expired").into()),
                ];
                Ok::<_, RouteError>(stream::iter(items))
            }),
        Route::get("/report")
            .name("report")
            .raw(|_: (), _: (), _ctx| async move {
                let mut response = Response::new(Body::from("a,b\n1,2\n"));
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
                Ok::<_, RouteError>(response)
            }),
    ]
}

fn client() -> Client<Router> {
    let dispatcher = RouterBuilder::new()
        .prefix("/api")
        .routes(routes())
        .build()
        .unwrap();
    let specs = dispatcher.specs();
    Client::from_specs(dispatcher.into_router(), &specs, "/api").unwrap()
}

#[tokio::test]
async fn test_call_json_route() {
    let post: Post = client().call("getPost", &PostId { id: 7 }, &()).await.unwrap();
    assert_eq!(
        post,
        Post {
            id: 7,
            title: "post 7".into()
        }
    );
}

#[tokio::test]
async fn test_call_with_json_body() {
    let post: Post = client()
        .call("createPost", &(), &NewPost { title: "hello".into() })
        .await
        .unwrap();
    assert_eq!(post.title, "hello");
}

#[tokio::test]
async fn test_call_null_result() {
    client()
        .call::<(), _, _>("deletePost", &PostId { id: 3 }, &())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_status_is_decoded() {
    let err = client()
        .call::<Post, _, _>("getPost", &PostId { id: 0 }, &())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message(), Some("no such post"));
}

#[tokio::test]
async fn test_unknown_route_is_not_sent() {
    let err = client()
        .call::<Post, _, _>("nope", &(), &())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownRoute(_)));
}

#[tokio::test]
async fn test_stream_items_and_links() {
    let items: Vec<_> = client()
        .stream::<u32, _, _>("numbers", &(), &PageQuery::default())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        items,
        [
            SeqItem::Next(1),
            SeqItem::Next(2),
            SeqItem::Links {
                prev: None,
                next: Some("/api/numbers?page=2".into())
            }
        ]
    );
}

#[tokio::test]
async fn test_pages_follow_next_links() {
    let client = client();
    let numbers: Vec<u32> = client
        .pages::<u32, _, _>("numbers", &(), &PageQuery::default())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(numbers, [1, 2, 3]);
}

#[tokio::test]
async fn test_follow_link() {
    let items: Vec<_> = client()
        .follow::<u32>("/api/numbers?page=2")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        items,
        [
            SeqItem::Next(3),
            SeqItem::Links {
                prev: Some("/api/numbers?page=1".into()),
                next: None
            }
        ]
    );
}

#[tokio::test]
async fn test_stream_error_frame() {
    let items: Vec<_> = client()
        .stream::<u32, _, _>("failing", &(), &())
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), &SeqItem::Next(1));
    let err = items[1].as_ref().unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.message(), Some("page token expired"));
}

#[tokio::test]
async fn test_raw_route() {
    let response = client().raw("report", &(), &()).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"a,b\n1,2\n");
}

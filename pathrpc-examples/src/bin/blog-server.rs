//! Serves the example blog.
//!
//! Run with: cargo run --bin blog-server
//! Settings: PORT, PATHRPC_PREFIX (e.g. `/api`), PATHRPC_ENV=production.
//!
//! Try:
//!   curl http://localhost:3000/posts/1
//!   curl "http://localhost:3000/posts?tag='routing'&limit=1"
//!   curl -X POST http://localhost:3000/posts -d '{"title": "Hi", "year": 2026}'

use pathrpc_axum::{CorsConfig, RouterBuilder};
use pathrpc_examples::{Store, routes, server_addr};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pathrpc_axum=debug,tower_http=info")),
        )
        .init();

    let dispatcher = RouterBuilder::from_env()
        .cors(CorsConfig::new().allow_any_origin())
        .routes(routes(Store::seeded()))
        .build()?;

    let prefix = dispatcher.config().prefix.clone();
    for spec in dispatcher.specs() {
        tracing::info!(name = %spec.name, method = %spec.method, path = %format!("{prefix}{}", spec.path), "route");
    }

    let app = dispatcher.into_router().layer(TraceLayer::new_for_http());

    let addr = server_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("blog listening on http://{addr}{prefix}");

    axum::serve(listener, app).await?;
    Ok(())
}

//! # Memory Server Example
//!
//! Everything lives in memory and is gone on exit. Notifications go to the push
//! gateway at `STORK_PUSH_URL`.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example memory_server --features "server memory notify mock_auth"
//! ```

use stork::prelude::*;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let push_url = env::var("STORK_PUSH_URL")?;
    let push_token = env::var("STORK_PUSH_TOKEN").ok();
    let notifier = HttpPushNotifier::new(push_url, push_token);

    let service = BundleService::new(MemoryMetadataStore::new(), MemoryBlobStore::new(), notifier)
        .with_config(ServiceConfig {
            base_path: "/api".to_string(),
            ..Default::default()
        });

    let app = StorkServer::new(StorkServerConfig {
        max_upload_bytes: Some(64 * 1024 * 1024),
    })
    .build(service, AllowAllAuth);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    println!("Server listening on http://{addr}/api");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

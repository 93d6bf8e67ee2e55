//! # Simple Server Example
//!
//! Filesystem stores, log-only notifications and no real authentication.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example simple_server --features "server fs notify mock_auth"
//! ```

use stork::prelude::*;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Providers
    let metadata = FileSystemMetadataStore::new("./stork_data/bundles");
    let blobs = FileSystemBlobStore::new("./stork_data/blobs");
    let notifier = LogNotifier;

    // Don't use this in production! This is just for demonstration/testing purposes
    let auth = AllowAllAuth; // e.g., use JwtService::from_public_key_file instead

    let service = BundleService::new(metadata, blobs, notifier).with_config(ServiceConfig {
        allowed_extensions: vec!["unity3d".to_string()],
        ..Default::default()
    });

    // Build App
    let app = StorkServer::default().build(service, auth);

    // Serve
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    println!("Server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! # Simple Client Example
//!
//! Uploads a bundle, verifies it, downloads it again and deletes it.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example simple_client --features "client"
//! ```

use std::path::Path;
use stork::prelude::*;
use tokio::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = StorkClient::new("http://localhost:3000", Some("dev".to_string()));
    let file_path = Path::new("assets/level1.unity3d");

    let message = NewMessage {
        title: "New level".to_string(),
        body: "Level 1 is ready to download".to_string(),
        icon: None,
        send_immediate: false,
    };
    let bundle = client
        .upload_bundle(file_path, "My Game", Some(&message))
        .await?;
    println!("Uploaded {}", bundle.key());

    // Verifying sends the pending notification
    client
        .set_verified(&bundle.version_hash, &bundle.info.name, true)
        .await?;

    let verified = client.list_bundles(Some("My Game"), true).await?;
    println!("{} verified bundle(s)", verified.len());

    let data = client
        .download_bundle(&bundle.version_hash, &bundle.info.name)
        .await?;
    fs::write("downloaded_level1.unity3d", data).await?;

    let report = client
        .delete_bundle(&bundle.version_hash, &bundle.info.name)
        .await?;
    println!("Deleted: {report:?}");

    Ok(())
}

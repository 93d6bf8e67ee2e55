mod notifier;

use clap::{Args, Parser, Subcommand};
use notifier::PushChannel;
use std::net::SocketAddr;
use std::path::PathBuf;
use stork_client::StorkClient;
use stork_core::prelude::*;
use stork_fs::{FileSystemBlobStore, FileSystemMetadataStore};
use stork_server::jwt::{JwtService, JwtSigner};
use stork_server::{StorkServer, StorkServerConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "stork")]
#[command(about = "CLI for the Stork asset bundle server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(short, long, env = "STORK_TOKEN")]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server
    Serve(ServeArgs),
    /// Upload a bundle file
    Upload {
        path: PathBuf,

        #[arg(short, long)]
        app_name: String,

        /// Notification title; attaches a message to the bundle
        #[arg(long, requires = "body")]
        title: Option<String>,

        #[arg(long, requires = "title")]
        body: Option<String>,

        #[arg(long, requires = "title")]
        icon: Option<String>,

        /// Notify as soon as the bundle is stored
        #[arg(long, requires = "title")]
        send_immediate: bool,
    },
    /// List bundles (unverified unless --verified)
    List {
        #[arg(short, long)]
        app_name: Option<String>,

        #[arg(long)]
        verified: bool,
    },
    /// Download a bundle
    Download {
        version_hash: String,
        name: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Mark a bundle verified (or unverified with --revoke)
    Verify {
        version_hash: String,
        name: String,
        #[arg(long)]
        revoke: bool,
    },
    /// Delete a bundle
    Delete { version_hash: String, name: String },
    /// Sign an RS256 token with a private key
    GenerateJwt {
        #[arg(long)]
        email: String,

        /// Private key PEM
        #[arg(long)]
        keypath: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        subject: Option<String>,

        /// Lifetime in seconds. Tokens never expire without it.
        #[arg(long)]
        expires_in: Option<u64>,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, env = "STORK_BASE_PATH", default_value = "/")]
    base_path: String,

    #[arg(long, env = "STORK_DATA_DIR", default_value = "./stork_data")]
    data_dir: PathBuf,

    /// Public key PEM used to verify bearer tokens
    #[arg(long, env = "STORK_PUBLIC_KEY")]
    public_key: PathBuf,

    /// Comma separated, e.g. "unity3d,bundle". "*" accepts any file.
    #[arg(
        long,
        env = "STORK_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_value = "unity3d"
    )]
    allowed_extensions: Vec<String>,

    #[arg(long, env = "STORK_PUSH_URL")]
    push_url: Option<String>,

    #[arg(long, env = "STORK_PUSH_TOKEN")]
    push_token: Option<String>,

    #[arg(long, env = "STORK_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,
}

impl ServeArgs {
    fn service_config(&self) -> ServiceConfig {
        let mut allowed_extensions: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        if allowed_extensions.iter().any(|ext| ext == "*") {
            allowed_extensions.clear();
        }

        ServiceConfig {
            base_path: self.base_path.clone(),
            allowed_extensions,
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let auth = JwtService::from_public_key_file(&args.public_key)?;
    let metadata = FileSystemMetadataStore::new(args.data_dir.join("bundles"));
    let blobs = FileSystemBlobStore::new(args.data_dir.join("blobs"));
    let notifier = PushChannel::from_config(args.push_url.clone(), args.push_token.clone());
    if matches!(notifier, PushChannel::Log(_)) {
        info!("STORK_PUSH_URL not set, notifications are only logged");
    }

    let service =
        BundleService::new(metadata, blobs, notifier).with_config(args.service_config());
    let app = StorkServer::new(StorkServerConfig {
        max_upload_bytes: args.max_upload_bytes,
    })
    .build(service, auth);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!(%addr, data_dir = %args.data_dir.display(), "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = StorkClient::new(cli.url.clone(), cli.token.clone());

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Upload {
            path,
            app_name,
            title,
            body,
            icon,
            send_immediate,
        } => {
            let message = title.zip(body).map(|(title, body)| NewMessage {
                title,
                body,
                icon,
                send_immediate,
            });

            let bundle = client
                .upload_bundle(&path, &app_name, message.as_ref())
                .await?;
            println!("✅ Upload successful! Hash: {}", bundle.version_hash);
            println!("{}", bundle.info.path);
        }
        Commands::List { app_name, verified } => {
            let bundles = client.list_bundles(app_name.as_deref(), verified).await?;
            println!("{}", serde_json::to_string_pretty(&bundles)?);
        }
        Commands::Download {
            version_hash,
            name,
            output,
        } => {
            println!("Downloading {name}...");

            let data = client.download_bundle(&version_hash, &name).await?;
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&output, data).await?;

            println!("✅ Saved to {output:?}");
        }
        Commands::Verify {
            version_hash,
            name,
            revoke,
        } => match client.set_verified(&version_hash, &name, !revoke).await? {
            UpdateOutcome::Updated(bundle) => {
                println!("✅ {} verified={}", bundle.key(), bundle.verified);
            }
            UpdateOutcome::NotUpdated => println!("Bundle was not updated"),
        },
        Commands::Delete { version_hash, name } => {
            let report = client.delete_bundle(&version_hash, &name).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::GenerateJwt {
            email,
            keypath,
            output,
            subject,
            expires_in,
        } => {
            let signer = JwtSigner::from_private_key_file(&keypath)?;
            let token = signer.mint(subject, Some(email.clone()), expires_in)?;
            tokio::fs::write(&output, &token).await?;

            println!("🔑 Token for '{email}' written to {output:?}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_config(extra: &[&str]) -> ServiceConfig {
        let args = ["stork", "serve", "--public-key", "public.pem"]
            .into_iter()
            .chain(extra.iter().copied());
        let Commands::Serve(args) = Cli::try_parse_from(args).unwrap().command else {
            panic!("expected serve");
        };
        args.service_config()
    }

    #[test]
    fn serve_reads_extension_list() {
        let config = serve_config(&["--allowed-extensions", "unity3d, .bundle"]);
        assert_eq!(config.allowed_extensions, vec!["unity3d", "bundle"]);
        assert_eq!(config.base_path, "/");
    }

    #[test]
    fn serve_accepts_unity_bundles_by_default() {
        assert_eq!(serve_config(&[]).allowed_extensions, vec!["unity3d"]);
        assert!(
            serve_config(&["--allowed-extensions", "*"])
                .allowed_extensions
                .is_empty()
        );
    }

    #[test]
    fn upload_message_needs_title_and_body() {
        assert!(
            Cli::try_parse_from(["stork", "upload", "a.bundle", "-a", "Demo", "--title", "New"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from([
                "stork", "upload", "a.bundle", "-a", "Demo", "--title", "New", "--body", "Go"
            ])
            .is_ok()
        );
    }
}

use crate::{api, state::AppState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use stork_core::prelude::*;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// The builder for the Stork Server.
#[derive(Clone, Debug, Default)]
pub struct StorkServer {
    config: StorkServerConfig,
}

impl StorkServer {
    pub fn new(config: StorkServerConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StorkServerConfig {
    /// Upper bound for request bodies in bytes.
    ///
    /// Defaults to `None` (no limit), since bundles are often large.
    pub max_upload_bytes: Option<usize>,
}

impl StorkServer {
    /// Builds the router. Routes are mounted under the service's configured
    /// base path so stored download paths resolve against this router.
    pub fn build<M, B, N, A>(self, service: BundleService<M, B, N>, auth: A) -> Router
    where
        M: MetadataStore,
        B: BlobStore,
        N: Notifier,
        A: AuthProvider,
    {
        let base_path = normalize_base_path(&service.config().base_path);
        let body_limit = self
            .config
            .max_upload_bytes
            .map(DefaultBodyLimit::max)
            .unwrap_or_else(DefaultBodyLimit::disable);
        let state = AppState { service, auth };

        let routes = Router::new()
            .route("/", get(api::liveness).post(api::auth_probe))
            .route(
                "/bundles",
                post(api::upload_bundle::<M, B, N, A>)
                    .get(api::list_bundles::<M, B, N, A>)
                    .delete(api::delete_bundle::<M, B, N, A>),
            )
            .route(
                "/bundles/{filename}",
                get(api::download_bundle::<M, B, N, A>).put(api::update_bundle::<M, B, N, A>),
            )
            .layer(body_limit)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        if base_path.is_empty() {
            routes
        } else {
            debug!(base_path = %base_path, "Mounting routes under base path");
            Router::new().nest(&base_path, routes)
        }
    }
}

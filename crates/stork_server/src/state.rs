use stork_core::prelude::*;

#[derive(Clone)]
pub struct AppState<M, B, N, A>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    pub service: BundleService<M, B, N>,
    pub auth: A,
}

use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use stork_core::prelude::*;

/// A wrapper struct indicating a request has been authenticated.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub User);

impl<M, B, N, A> FromRequestParts<AppState<M, B, N, A>> for AuthenticatedUser
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<M, B, N, A>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|auth_header| auth_header.to_str().ok())
            .map(|header_str| {
                header_str
                    .strip_prefix("Bearer ")
                    .unwrap_or(header_str)
                    .trim()
            })
            .unwrap_or("");

        let user = state.auth.verify(token).await?;
        Ok(AuthenticatedUser(user))
    }
}

use stork_core::prelude::*;

/// Accepts every request, including ones without a token.
#[derive(Clone)]
pub struct AllowAllAuth;

impl AuthProvider for AllowAllAuth {
    async fn verify(&self, _token: &str) -> Result<User, AuthError> {
        Ok(User {
            id: "dev_user".to_string(),
            email: None,
        })
    }
}

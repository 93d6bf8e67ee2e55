use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use stork_core::prelude::{AuthError, AuthProvider, User};

/// Bearer token claims. Tokens minted by older tooling only carry `email`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: u64,
    /// Enforced when present, but not required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Verifies RS256 bearer tokens against a public key.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn from_public_pem(pem: &[u8]) -> Result<Self, anyhow::Error> {
        let decoding_key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| anyhow::anyhow!("Failed to read RSA public key: {e}"))?;
        Ok(Self { decoding_key })
    }

    pub fn from_public_key_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        Self::from_public_pem(&pem)
    }

    pub fn verify(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::InvalidToken,
                }
            })?;

        let Claims { sub, email, .. } = token_data.claims;
        let id = sub.or_else(|| email.clone()).ok_or(AuthError::InvalidToken)?;
        Ok(User { id, email })
    }
}

impl AuthProvider for JwtService {
    async fn verify(&self, token: &str) -> Result<User, AuthError> {
        JwtService::verify(self, token)
    }
}

/// Mints RS256 tokens with a private key.
#[derive(Clone)]
pub struct JwtSigner {
    encoding_key: EncodingKey,
}

impl JwtSigner {
    pub fn from_private_pem(pem: &[u8]) -> Result<Self, anyhow::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| anyhow::anyhow!("Failed to read RSA private key: {e}"))?;
        Ok(Self { encoding_key })
    }

    pub fn from_private_key_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        Self::from_private_pem(&pem)
    }

    pub fn mint(
        &self,
        subject: Option<String>,
        email: Option<String>,
        duration_seconds: Option<u64>,
    ) -> Result<String, anyhow::Error> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let claims = Claims {
            sub: subject,
            email,
            iat: now,
            exp: duration_seconds.map(|d| now + d),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?;
        Ok(token)
    }
}

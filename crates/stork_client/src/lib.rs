use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use stork_core::prelude::{Bundle, DeleteReport, NewMessage, UpdateOutcome};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorkClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned error {0}: {1}")]
    ServerError(StatusCode, String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, StorkClientError>;

#[derive(Clone)]
pub struct StorkClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

#[derive(Deserialize)]
struct BundleList {
    bundles: Vec<Bundle>,
}

#[derive(Deserialize)]
struct AuthProbe {
    user: String,
}

impl StorkClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            token,
        }
    }

    fn auth_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    /// Builds `{base_url}/{segments...}`, escaping each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorkClientError::Validation(format!("Invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StorkClientError::Validation("Base url cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorkClientError::ServerError(status, text));
        }
        Ok(response)
    }

    /// POST / with the configured token. Returns the authenticated user id.
    pub async fn probe_auth(&self) -> Result<String> {
        let url = self.url(&[])?;
        let response = self.auth_request(self.client.post(url)).send().await?;
        let probe: AuthProbe = Self::check(response).await?.json().await?;
        Ok(probe.user)
    }

    pub async fn upload_bundle(
        &self,
        path: &Path,
        app_name: &str,
        message: Option<&NewMessage>,
    ) -> Result<Bundle> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorkClientError::Validation(format!("No file name in {path:?}")))?
            .to_string();
        let data = tokio::fs::read(path).await?;

        let mut form = Form::new()
            .part("bundle", Part::bytes(data).file_name(file_name))
            .text("appName", app_name.to_string());
        if let Some(message) = message {
            let json = serde_json::to_string(message)
                .map_err(|e| StorkClientError::Validation(format!("Invalid message: {e}")))?;
            form = form.text("message", json);
        }

        let url = self.url(&["bundles"])?;
        let response = self
            .auth_request(self.client.post(url))
            .multipart(form)
            .send()
            .await?;

        let bundle = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StorkClientError::Validation(format!("Failed to parse bundle: {e}")))?;
        Ok(bundle)
    }

    pub async fn list_bundles(&self, app_name: Option<&str>, verified: bool) -> Result<Vec<Bundle>> {
        let url = self.url(&["bundles"])?;
        let mut query = vec![("verified", verified.to_string())];
        if let Some(app_name) = app_name {
            query.push(("appname", app_name.to_string()));
        }

        let response = self.client.get(url).query(&query).send().await?;
        let list: BundleList = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StorkClientError::Validation(format!("Failed to parse bundles: {e}")))?;
        Ok(list.bundles)
    }

    pub async fn download_bundle(&self, version_hash: &str, name: &str) -> Result<Vec<u8>> {
        let url = self.url(&["bundles", name])?;
        let response = self
            .client
            .get(url)
            .query(&[("versionhash", version_hash)])
            .send()
            .await?;

        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn set_verified(
        &self,
        version_hash: &str,
        name: &str,
        verified: bool,
    ) -> Result<UpdateOutcome> {
        let url = self.url(&["bundles", name])?;
        let response = self
            .auth_request(self.client.put(url))
            .query(&[("versionhash", version_hash)])
            .json(&serde_json::json!({ "verified": verified }))
            .send()
            .await?;

        let value: serde_json::Value = Self::check(response).await?.json().await?;
        if value.get("versionHash").is_none() {
            return Ok(UpdateOutcome::NotUpdated);
        }
        let bundle = serde_json::from_value(value)
            .map_err(|e| StorkClientError::Validation(format!("Failed to parse bundle: {e}")))?;
        Ok(UpdateOutcome::Updated(bundle))
    }

    pub async fn delete_bundle(&self, version_hash: &str, name: &str) -> Result<DeleteReport> {
        let url = self.url(&["bundles"])?;
        let response = self
            .auth_request(self.client.delete(url))
            .query(&[("versionhash", version_hash), ("name", name)])
            .send()
            .await?;

        let report = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StorkClientError::Validation(format!("Failed to parse report: {e}")))?;
        Ok(report)
    }
}

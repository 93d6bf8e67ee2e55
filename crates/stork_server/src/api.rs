use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use stork_core::prelude::*;
use tracing::info;

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Protocol and host the client used to reach us, honoring reverse proxy headers.
fn request_origin(headers: &HeaderMap) -> String {
    let proto = header_value(headers, "x-forwarded-proto").unwrap_or("http");
    let host = header_value(headers, "x-forwarded-host")
        .or_else(|| header_value(headers, header::HOST.as_str()))
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::from(BundleError::Validation(format!("{name} is required"))))
}

/// RFC 5987 `attr-char`: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition with an ASCII `filename` and, for names that need
/// it, the exact UTF-8 name as `filename*`.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            utf8_percent_encode(name, ATTR_CHAR)
        )
    }
}

/// Turns an extractor rejection message into a JSON validation error.
fn rejected(body_text: String) -> ApiError {
    ApiError::from(BundleError::Validation(body_text))
}

/// GET /
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /
pub async fn auth_probe(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "authenticated",
        "user": user.id
    }))
}

/// POST /bundles
/// Multipart fields: `bundle` (file), `appName`, optional `message` (JSON).
pub async fn upload_bundle<M, B, N, A>(
    State(state): State<AppState<M, B, N, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ApiError::from(BundleError::Validation(format!("Malformed upload: {e}")))
    };

    let mut multipart = multipart.map_err(|e| rejected(e.body_text()))?;
    let mut file = None;
    let mut app_name = None;
    let mut message = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("bundle") => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(malformed)?;
                file = Some((required(file_name, "bundle file name")?, data));
            }
            Some("appName") => {
                app_name = Some(field.text().await.map_err(malformed)?);
            }
            Some("message") => {
                let text = field.text().await.map_err(malformed)?;
                if !text.trim().is_empty() {
                    let parsed = serde_json::from_str::<NewMessage>(&text).map_err(|e| {
                        BundleError::Validation(format!("Malformed message: {e}"))
                    })?;
                    message = Some(parsed);
                }
            }
            _ => {}
        }
    }

    let (name, data) = file
        .ok_or_else(|| ApiError::from(BundleError::Validation("bundle file is required".into())))?;
    let app_name = required(app_name, "appName")?;

    info!(user = %user.id, name = %name, app = %app_name, "Bundle upload");
    let bundle = state
        .service
        .add_bundle(NewBundle {
            data,
            name,
            app_name,
            message,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(bundle.qualified(&request_origin(&headers))),
    ))
}

#[derive(Deserialize)]
pub struct ListParams {
    appname: Option<String>,
    verified: Option<String>,
}

/// GET /bundles?appname=&verified=
pub async fn list_bundles<M, B, N, A>(
    State(state): State<AppState<M, B, N, A>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    let Query(params) = params.map_err(|e| rejected(e.body_text()))?;
    let query = BundleQuery {
        app_name: params.appname.filter(|a| !a.is_empty()),
        verified: params.verified.map(|v| v.eq_ignore_ascii_case("true")),
    };

    let origin = request_origin(&headers);
    let bundles: Vec<Bundle> = state
        .service
        .list_bundles(query)
        .await?
        .into_iter()
        .map(|bundle| bundle.qualified(&origin))
        .collect();

    Ok(Json(serde_json::json!({ "bundles": bundles })))
}

#[derive(Deserialize)]
pub struct KeyParams {
    versionhash: Option<String>,
    name: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    message: &'static str,
    #[serde(flatten)]
    report: DeleteReport,
}

/// DELETE /bundles?versionhash=&name=
pub async fn delete_bundle<M, B, N, A>(
    State(state): State<AppState<M, B, N, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    params: Result<Query<KeyParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    let Query(params) = params.map_err(|e| rejected(e.body_text()))?;
    let key = BundleKey::new(
        required(params.versionhash, "versionhash")?,
        required(params.name, "name")?,
    );

    info!(user = %user.id, key = %key, "Bundle delete");
    let report = state.service.delete_bundle(&key).await?;

    Ok(Json(DeleteResponse {
        message: "Bundle deleted",
        report,
    }))
}

#[derive(Deserialize)]
pub struct HashParams {
    versionhash: Option<String>,
}

/// GET /bundles/{filename}?versionhash=
pub async fn download_bundle<M, B, N, A>(
    State(state): State<AppState<M, B, N, A>>,
    filename: Result<Path<String>, PathRejection>,
    params: Result<Query<HashParams>, QueryRejection>,
) -> Result<Response, ApiError>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    let Path(filename) = filename.map_err(|e| rejected(e.body_text()))?;
    let Query(params) = params.map_err(|e| rejected(e.body_text()))?;
    let key = BundleKey::new(required(params.versionhash, "versionhash")?, filename);
    let (bundle, stream) = state.service.open_bundle(&key).await?;

    let content_type = mime_guess::from_path(&bundle.info.name)
        .first_or_octet_stream()
        .to_string();
    let disposition = content_disposition(&bundle.info.name);

    let mut response = Body::from_stream(stream).into_response();
    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response_headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    verified: Option<bool>,
}

/// PUT /bundles/{filename}?versionhash=
pub async fn update_bundle<M, B, N, A>(
    State(state): State<AppState<M, B, N, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
    filename: Result<Path<String>, PathRejection>,
    params: Result<Query<HashParams>, QueryRejection>,
    req: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
    A: AuthProvider,
{
    let Path(filename) = filename.map_err(|e| rejected(e.body_text()))?;
    let Query(params) = params.map_err(|e| rejected(e.body_text()))?;
    let Json(req) = req.map_err(|e| rejected(e.body_text()))?;
    let key = BundleKey::new(required(params.versionhash, "versionhash")?, filename);

    info!(user = %user.id, key = %key, verified = ?req.verified, "Bundle update");
    let response = match state.service.update_bundle(&key, req.verified).await? {
        UpdateOutcome::Updated(bundle) => {
            Json(bundle.qualified(&request_origin(&headers))).into_response()
        }
        UpdateOutcome::NotUpdated => {
            Json(serde_json::json!({ "status": "Bundle was not updated" })).into_response()
        }
    };

    Ok(response)
}

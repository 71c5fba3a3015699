//! HTTP surface
//!
//! `/get-secret` and `/set-secret` take the caller's bearer token in the
//! `Authorization` header. CORS preflight is answered by the layer before
//! any handler runs.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use keyvault_core::{VaultError, VaultService};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SetSecretRequest {
    #[serde(default)]
    pub secret: Option<SecretString>,
}

#[derive(Debug, Serialize)]
pub struct SetSecretResponse {
    pub success: bool,
    pub cleared: bool,
}

#[derive(Serialize)]
pub struct GetSecretResponse {
    pub secret: Option<String>,
}

/// Error body: `{ "error": <message>, "code": <kind> }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            VaultError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            VaultError::DecryptionFailure(_)
            | VaultError::EncryptionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Top-level message only; sources may carry upstream detail
        let message = match &err {
            VaultError::Unauthenticated(_) => "Unauthorized".to_string(),
            other => other.to_string(),
        };

        Self {
            status,
            code: err.code(),
            message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "code": self.code }));
        (self.status, body).into_response()
    }
}

/// CORS layer shared by every route. `None` allows any origin.
pub fn cors(allowed_origin: Option<HeaderValue>) -> CorsLayer {
    let origin = match allowed_origin {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}

pub fn router(service: VaultService, cors: CorsLayer) -> Router {
    Router::new()
        .route("/get-secret", get(get_secret).post(get_secret))
        .route("/set-secret", post(set_secret))
        .route("/health", get(health))
        .with_state(service)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn get_secret(
    State(service): State<VaultService>,
    headers: HeaderMap,
) -> Result<Json<GetSecretResponse>, ApiError> {
    let secret = service.get_secret(authorization(&headers)).await?;

    Ok(Json(GetSecretResponse {
        secret: secret.map(|s| s.expose_secret().clone()),
    }))
}

async fn set_secret(
    State(service): State<VaultService>,
    headers: HeaderMap,
    body: Result<Json<SetSecretRequest>, JsonRejection>,
) -> Result<Json<SetSecretResponse>, ApiError> {
    // Authenticate before looking at the body
    let auth = authorization(&headers);
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            service.authenticate(auth).await?;
            return Err(rejection.into());
        }
    };

    let secret = request.secret.as_ref().map(|s| s.expose_secret().as_str());
    let outcome = service.set_secret(auth, secret).await?;

    Ok(Json(SetSecretResponse {
        success: true,
        cleared: outcome.cleared(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

//! HTTP API server.
//!
//! Exposes the checker, search history, quota, blog, and admin overview
//! as a JSON API for the web front end.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`    | `/health` | | Health check (returns version) |
//! | `POST`   | `/metrics` | optional | Look up metrics for `{ "url": ... }` |
//! | `GET`    | `/quota` | optional | Searches used and left today |
//! | `GET`    | `/history` | optional | Most recent searches, newest first |
//! | `DELETE` | `/history` | required | Clear the caller's history |
//! | `GET`    | `/blog?q=` | | All posts, optionally filtered |
//! | `GET`    | `/blog/recent` | | Three newest posts |
//! | `GET`    | `/blog/{slug}` | | One post |
//! | `GET`    | `/blog/{slug}/related` | | Up to three other posts |
//! | `POST`   | `/blog` | admin | Create a post |
//! | `PUT`    | `/blog/{id}` | admin | Edit a post |
//! | `DELETE` | `/blog/{id}` | admin | Delete a post |
//! | `GET`    | `/admin/overview` | admin | Totals and recent activity |
//!
//! # Authentication
//!
//! Callers identify with `Authorization: Bearer <token>`. No header means
//! an anonymous caller; an unrecognized token is rejected with 401. The
//! first request from an identity creates its profile.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "quota_exceeded", "message": "Daily search limit reached ..." } }
//! ```
//!
//! Error codes: `invalid_url` (400), `bad_request` (400), `unauthorized` (401),
//! `forbidden` (403), `not_found` (404), `conflict` (409),
//! `quota_exceeded` (429), `internal` (500), `upstream_failure` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front end
//! can be served from anywhere.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use dapa_checker_core::error::CheckError;
use dapa_checker_core::models::{BlogDraft, BlogPost, SearchRecord};
use dapa_checker_core::quota::QuotaUsage;
use dapa_checker_core::store::StoreError;

use crate::app::App;
use crate::blog::BlogError;
use crate::config::Config;
use crate::identity::{bearer_token, Principal};
use crate::profiles::sync_profile;
use crate::stats::{overview, Overview};

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "DA/PA checker listening");
    serve(app, listener).await
}

/// Serve `app` on an already-bound listener.
pub async fn serve(app: App, listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router(app)).await?;
    Ok(())
}

/// Build the route table.
pub fn router(app: App) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", post(handle_metrics))
        .route("/quota", get(handle_quota))
        .route("/history", get(handle_history).delete(handle_clear_history))
        .route("/blog", get(handle_list_posts).post(handle_create_post))
        .route("/blog/recent", get(handle_recent_posts))
        .route(
            "/blog/{key}",
            get(handle_get_post)
                .put(handle_update_post)
                .delete(handle_delete_post),
        )
        .route("/blog/{key}/related", get(handle_related_posts))
        .route("/admin/overview", get(handle_overview))
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn forbidden(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

/// Storage detail goes to the log only.
fn internal(context: &str, err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "{}", context);
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Something went wrong. Please try again.",
    )
}

impl From<CheckError> for AppError {
    fn from(e: CheckError) -> Self {
        let status = match e {
            CheckError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            CheckError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            CheckError::UpstreamFailure => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, e.code(), e.to_string())
    }
}

impl From<BlogError> for AppError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::Invalid(d) => bad_request(d.to_string()),
            BlogError::NotFound(_) => not_found("Blog post not found"),
            BlogError::SlugTaken(slug) => AppError::new(
                StatusCode::CONFLICT,
                "conflict",
                format!("slug '{}' is already in use", slug),
            ),
            BlogError::Storage(inner) => internal("blog storage failure", inner),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        internal("storage failure", e)
    }
}

// ============ Authentication ============

/// Resolve the caller from the `Authorization` header.
///
/// `Ok(None)` for anonymous callers. Authenticated callers get their
/// profile created on first sight.
async fn caller(app: &App, headers: &HeaderMap) -> Result<Option<Principal>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| unauthorized("Malformed Authorization header"))?;
    let principal = app
        .identities
        .resolve(token)
        .await
        .ok_or_else(|| unauthorized("Unknown or expired token"))?;

    if let Err(e) = sync_profile(app.store.as_ref(), &principal, Utc::now()).await {
        tracing::warn!(identity = %principal.identity, error = %e, "profile sync failed");
    }
    Ok(Some(principal))
}

async fn require_user(app: &App, headers: &HeaderMap) -> Result<Principal, AppError> {
    caller(app, headers)
        .await?
        .ok_or_else(|| unauthorized("Sign in required"))
}

async fn require_admin(app: &App, headers: &HeaderMap) -> Result<Principal, AppError> {
    let principal = require_user(app, headers).await?;
    if !principal.is_admin {
        return Err(forbidden("Admin access required"));
    }
    Ok(principal)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Checker ============

#[derive(Deserialize)]
struct MetricsRequest {
    url: String,
}

async fn handle_metrics(
    State(app): State<App>,
    headers: HeaderMap,
    body: Result<Json<MetricsRequest>, JsonRejection>,
) -> Result<Json<SearchRecord>, AppError> {
    let principal = caller(&app, &headers).await?;
    let Json(req) = body?;
    let identity = principal.as_ref().map(|p| &p.identity);
    let record = app.checker.fetch_metrics(&req.url, identity).await?;
    Ok(Json(record))
}

async fn handle_quota(
    State(app): State<App>,
    headers: HeaderMap,
) -> Result<Json<QuotaUsage>, AppError> {
    let principal = caller(&app, &headers).await?;
    let usage = app
        .checker
        .quota_usage(principal.as_ref().map(|p| &p.identity))
        .await?;
    Ok(Json(usage))
}

async fn handle_history(
    State(app): State<App>,
    headers: HeaderMap,
) -> Result<Json<Vec<SearchRecord>>, AppError> {
    let principal = caller(&app, &headers).await?;
    let history = app
        .checker
        .get_history(principal.as_ref().map(|p| &p.identity))
        .await;
    Ok(Json(history))
}

#[derive(Serialize)]
struct ClearHistoryResponse {
    removed: u64,
}

async fn handle_clear_history(
    State(app): State<App>,
    headers: HeaderMap,
) -> Result<Json<ClearHistoryResponse>, AppError> {
    let principal = require_user(&app, &headers).await?;
    let removed = app.checker.clear_history(&principal.identity).await?;
    Ok(Json(ClearHistoryResponse { removed }))
}

// ============ Blog ============

#[derive(Deserialize)]
struct ListQuery {
    q: Option<String>,
}

async fn handle_list_posts(
    State(app): State<App>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BlogPost>>, AppError> {
    Ok(Json(app.blog.list(query.q.as_deref()).await?))
}

async fn handle_recent_posts(State(app): State<App>) -> Result<Json<Vec<BlogPost>>, AppError> {
    Ok(Json(app.blog.recent().await?))
}

async fn handle_get_post(
    State(app): State<App>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, AppError> {
    Ok(Json(app.blog.get_by_slug(&slug).await?))
}

async fn handle_related_posts(
    State(app): State<App>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<BlogPost>>, AppError> {
    Ok(Json(app.blog.related(&slug).await?))
}

async fn handle_create_post(
    State(app): State<App>,
    headers: HeaderMap,
    body: Result<Json<BlogDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<BlogPost>), AppError> {
    require_admin(&app, &headers).await?;
    let Json(draft) = body?;
    let post = app.blog.create(&draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn handle_update_post(
    State(app): State<App>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<BlogDraft>, JsonRejection>,
) -> Result<Json<BlogPost>, AppError> {
    require_admin(&app, &headers).await?;
    let Json(draft) = body?;
    Ok(Json(app.blog.update(&id, &draft, Utc::now()).await?))
}

async fn handle_delete_post(
    State(app): State<App>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&app, &headers).await?;
    app.blog.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Admin ============

async fn handle_overview(
    State(app): State<App>,
    headers: HeaderMap,
) -> Result<Json<Overview>, AppError> {
    require_admin(&app, &headers).await?;
    Ok(Json(overview(app.store.as_ref()).await?))
}

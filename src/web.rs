use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::Concierge;
use crate::error::ConciergeError;
use crate::stocks::{render_index, render_stock_page};

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub text: String,
}

/// Error body returned by the JSON routes
pub struct ApiError(ConciergeError);

impl From<ConciergeError> for ApiError {
    fn from(e: ConciergeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ConciergeError::Validation(_) => StatusCode::BAD_REQUEST,
            ConciergeError::NotFound(_) => StatusCode::NOT_FOUND,
            ConciergeError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Web routes for the chat API and stock pages, behind optional bearer auth
pub fn router(concierge: Arc<Concierge>) -> Router {
    let bearer_token = concierge.config().server.bearer_token.clone();
    guarded(routes(concierge), bearer_token)
}

/// Chat API and stock pages without auth or health check
pub fn routes(concierge: Arc<Concierge>) -> Router {
    Router::new()
        .route("/", get(stock_index))
        .route("/stock/:symbol", get(stock_page))
        .route("/api/stock/:symbol", get(stock_json))
        .route("/api/chat/:id", get(get_conversation))
        .route("/api/chat/:id/messages", post(send_message))
        .route("/api/chat/:id/selection", delete(clear_selection))
        .route("/api/chat/:id/selection/:hotel_id", post(toggle_selection))
        .route("/api/chat/:id/compare", post(compare))
        .with_state(concierge)
}

/// Wrap everything routed so far in bearer auth, then add `/health`
pub fn guarded(mut router: Router, bearer_token: Option<String>) -> Router {
    if let Some(expected) = bearer_token {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }
    router.route("/health", get(|| async { "ok" }))
}

async fn get_conversation(
    State(concierge): State<Arc<Concierge>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(concierge.conversation(&id).await)
}

async fn send_message(
    State(concierge): State<Arc<Concierge>>,
    Path(id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let response = concierge.send_message(&id, &body.text).await?;
    Ok(Json(response))
}

async fn toggle_selection(
    State(concierge): State<Arc<Concierge>>,
    Path((id, hotel_id)): Path<(String, String)>,
) -> impl IntoResponse {
    Json(concierge.toggle_selection(&id, &hotel_id).await)
}

async fn clear_selection(
    State(concierge): State<Arc<Concierge>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(concierge.clear_selection(&id).await)
}

async fn compare(
    State(concierge): State<Arc<Concierge>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = concierge.compare_selection(&id).await?;
    Ok(Json(response))
}

async fn stock_index(State(concierge): State<Arc<Concierge>>) -> Html<String> {
    Html(render_index(concierge.stocks().symbols()))
}

async fn stock_page(
    State(concierge): State<Arc<Concierge>>,
    Path(symbol): Path<String>,
) -> Result<Html<String>, ApiError> {
    let page = concierge.stock_page(&symbol).await?;
    Ok(Html(render_stock_page(&page)))
}

async fn stock_json(
    State(concierge): State<Arc<Concierge>>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let page = concierge.stock_page(&symbol).await?;
    Ok(Json(page))
}

pub async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    if req.uri().path().eq("/health") {
        return next.run(req).await;
    }
    let headers: &HeaderMap = req.headers();
    let header_ok = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()));
    // Clients that cannot set headers may pass access_token or token
    let query_ok = req.uri().query().is_some_and(|q| {
        q.split('&').any(|pair| {
            pair.split_once('=').is_some_and(|(k, v)| {
                (k == "access_token" || k == "token") && v == expected.as_str()
            })
        })
    });
    if !(header_ok || query_ok) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}

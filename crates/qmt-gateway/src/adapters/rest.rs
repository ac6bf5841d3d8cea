//! REST adapter.
//!
//! Thin axum layer over the gateway. Handlers deserialize, call the one
//! matching gateway method, and serialize the result; the error-to-status
//! mapping below is the only REST-specific policy in the crate.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::GatewayError;
use crate::gateway::Gateway;

use super::{ErrorBody, OpenSessionRequest, SubmitOrderRequest};

struct ApiError(GatewayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidAccount(_) | GatewayError::InvalidOrder(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GatewayError::OrderRejected(_) => StatusCode::BAD_REQUEST,
            GatewayError::Connection(_) => StatusCode::BAD_GATEWAY,
            GatewayError::AmbiguousOutcome(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Config(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/api/v1/trading/health", get(health))
        .route("/api/v1/trading/connect", post(connect))
        .route("/api/v1/trading/disconnect/:session_id", post(disconnect))
        .route("/api/v1/trading/sessions", get(list_sessions))
        .route("/api/v1/trading/status/:session_id", get(session_status))
        .route("/api/v1/trading/order/:session_id", post(submit_order))
        .route("/api/v1/trading/cancel/:session_id", post(cancel_order))
        .route("/api/v1/trading/orders/:session_id", get(list_orders))
        .route("/api/v1/trading/asset/:session_id", get(query_asset))
        .route("/api/v1/trading/positions/:session_id", get(query_positions))
        .route("/api/v1/trading/audit", get(audit_tail))
        .with_state(gateway)
}

/// Serve until the shutdown future resolves.
pub async fn serve(
    gateway: Arc<Gateway>,
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "REST adapter listening");
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.status())
}

async fn connect(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<OpenSessionRequest>,
) -> Response {
    match gateway
        .open_session(&req.account_id, req.credentials.as_deref())
        .await
    {
        Ok(info) => (StatusCode::CREATED, Json(info)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn disconnect(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
) -> ApiResult<crate::session::SessionInfo> {
    Ok(Json(gateway.close_session(&session_id).await?))
}

async fn list_sessions(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.sessions())
}

async fn session_status(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
) -> ApiResult<crate::session::SessionInfo> {
    Ok(Json(gateway.session(&session_id)?))
}

async fn submit_order(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitOrderRequest>,
) -> Response {
    match gateway.submit_order(&session_id, req.ticket).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CancelOrderRequest {
    order_id: String,
}

async fn cancel_order(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> ApiResult<crate::interceptor::OrderReceipt> {
    Ok(Json(gateway.cancel_order(&session_id, &req.order_id).await?))
}

async fn list_orders(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<crate::interceptor::OrderRecord>> {
    Ok(Json(gateway.orders(&session_id)?))
}

async fn query_asset(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
) -> ApiResult<qmt_common::AssetSnapshot> {
    Ok(Json(gateway.query_asset(&session_id).await?))
}

async fn query_positions(
    State(gateway): State<Arc<Gateway>>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<qmt_common::PositionSnapshot>> {
    Ok(Json(gateway.query_positions(&session_id).await?))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

async fn audit_tail(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    Json(gateway.audit_tail(query.limit))
}

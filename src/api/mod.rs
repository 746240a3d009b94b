//! HTTP API - order creation/query boundary plus health and status endpoints
//!
//! The manual deposit confirmation endpoint exists for demos and operator
//! intervention; it goes through the same conditional `try_mark_deposited`
//! path as automatic detection, never a raw status write.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::{ApiConfig, Settings};
use crate::error::SwapError;
use crate::metrics;
use crate::order::{Direction, Network, Order};
use crate::store::{OrderStore, StatusCounts};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub settings: Arc<Settings>,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    store: Arc<dyn OrderStore>,
    settings: Arc<Settings>,
) -> crate::error::SwapResult<()> {
    let state = AppState { store, settings };

    let app = Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/confirm-deposit", post(confirm_deposit))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwapError::Config(format!("API bind: {}", e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| SwapError::Internal(e.to_string()))?;

    Ok(())
}

// Request/response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub direction: String,
    pub amount: f64,
    pub recipient_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub deposit_address: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub direction: &'static str,
    pub amount: f64,
    pub recipient_address: String,
    pub deposit_address: String,
    pub status: &'static str,
    pub output_amount: f64,
    pub created_at: String,
    pub expires_at: String,
    pub deposit_tx_ref: Option<String>,
    pub output_tx_ref: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            direction: order.direction.as_str(),
            amount: order.requested_amount,
            recipient_address: order.recipient_address,
            deposit_address: order.deposit_address,
            status: order.status.as_str(),
            output_amount: order.output_amount,
            created_at: order.created_at.to_rfc3339(),
            expires_at: order.expires_at.to_rfc3339(),
            deposit_tx_ref: order.deposit_tx_ref,
            output_tx_ref: order.output_tx_ref,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDepositRequest {
    pub deposit_tx_ref: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDepositResponse {
    pub success: bool,
    pub deposit_tx_ref: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API error with an HTTP status, rendered as a JSON body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Order not found".to_string(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<SwapError> for ApiError {
    fn from(e: SwapError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// Handlers

/// Create a new swap order: compute the output amount from the configured
/// rate, assign the custody address for the deposit leg, insert as pending.
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let direction = Direction::parse(&req.direction)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown direction: {}", req.direction)))?;

    if !req.amount.is_finite() || req.amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    if req.recipient_address.is_empty() {
        return Err(ApiError::bad_request("Missing recipient address"));
    }

    let rate = state.settings.rates.eth_per_ada;
    let output_amount = match direction {
        Direction::AdaToEth => req.amount * rate,
        Direction::EthToAda => req.amount / rate,
    };

    let deposit_address = match direction.source() {
        Network::Cardano => state.settings.ada.custody_address.clone(),
        Network::Ethereum => state.settings.eth.custody_address.clone(),
    };

    let order = Order::new(
        direction,
        req.amount,
        req.recipient_address,
        deposit_address,
        output_amount,
        Utc::now(),
        Duration::seconds(state.settings.service.order_expiry_secs),
    );

    state.store.create(&order).await?;

    info!(order_id = %order.id, direction = direction.as_str(), "order created");
    metrics::record_order_created(direction);

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        deposit_address: order.deposit_address,
        expires_at: order.expires_at.to_rfc3339(),
    }))
}

/// Fetch an order by id. Unknown and malformed ids are both "not found".
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: Uuid = id.parse().map_err(|_| ApiError::not_found())?;

    let order = state.store.get(id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(order.into()))
}

/// Manual override: confirm a deposit for a pending order. Uses the same
/// compare-and-set as automatic detection, so it can never clobber a deposit
/// that polling already recorded.
async fn confirm_deposit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ConfirmDepositRequest>>,
) -> Result<Json<ConfirmDepositResponse>, ApiError> {
    let id: Uuid = id.parse().map_err(|_| ApiError::not_found())?;

    // 404 for unknown ids, 409 for known-but-not-pending
    state.store.get(id).await?.ok_or_else(ApiError::not_found)?;

    let deposit_tx_ref = body
        .and_then(|Json(req)| req.deposit_tx_ref)
        .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4()));

    if state.store.try_mark_deposited(id, &deposit_tx_ref).await? {
        info!(order_id = %id, tx_ref = %deposit_tx_ref, "deposit confirmed manually");
        metrics::record_manual_confirmation();
        Ok(Json(ConfirmDepositResponse {
            success: true,
            deposit_tx_ref,
        }))
    } else {
        Err(ApiError::conflict("Order is not pending"))
    }
}

/// Basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness - verifies the order store answers queries
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.store.status_counts().await.is_ok();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: db_ok,
            database: db_ok,
        }),
    )
}

/// Per-status order counts
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatusCounts>, ApiError> {
    Ok(Json(state.store.status_counts().await?))
}

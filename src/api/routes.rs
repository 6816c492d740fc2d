//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                            | Return Type         |
// |-----------------------|----------------------------------------|---------------------|
// | health                | Health check endpoint                  | Response            |
// | create_order          | Submit and match a new order           | ApiResult<Response> |
// | cancel_order          | Cancel an existing order               | ApiResult<Response> |
// | get_order             | Get details of an order                | ApiResult<Response> |
// | get_order_book        | Get the resting book for instrument    | ApiResult<Response> |
// | get_transactions      | Get an instrument's ledger entries     | ApiResult<Response> |
// | create_instrument     | List a new bond instrument             | ApiResult<Response> |
// | create_user           | Register a user account                | ApiResult<Response> |
// | get_account           | Get a user's wallet and trade stats    | ApiResult<Response> |
// | sweep_expired         | Run the expiry sweep                   | ApiResult<Response> |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::{
    ApiError, ApiResult, AppState, CreateInstrumentRequest, CreateOrderRequest, CreateUserRequest,
    SweepResponse,
};
use crate::domain::services::matching::NewOrderRequest;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// Submit and match a new order
pub async fn create_order(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<Response> {
    let report = state.service.submit_order(NewOrderRequest::from(req)).await?;
    Ok((StatusCode::CREATED, Json(report)).into_response())
}

/// Cancel an existing order
pub async fn cancel_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let actor = params
        .get("actor")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| ApiError::BadRequest("actor query parameter is required".to_string()))?;
    let reason = params
        .get("reason")
        .map(String::as_str)
        .unwrap_or("user requested");

    let order = state.service.cancel_order(order_id, reason, actor).await?;
    Ok((StatusCode::OK, Json(order)).into_response())
}

/// Get details of an order
pub async fn get_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Response> {
    let order = state.service.get_order(order_id).await?;
    Ok((StatusCode::OK, Json(order)).into_response())
}

/// Get the resting order book for an instrument
pub async fn get_order_book(
    Extension(state): Extension<Arc<AppState>>,
    Path(instrument_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let depth = params
        .get("depth")
        .and_then(|depth| depth.parse::<usize>().ok())
        .unwrap_or(10);
    let snapshot = state.service.order_book(instrument_id, depth).await?;
    Ok((StatusCode::OK, Json(snapshot)).into_response())
}

/// Get an instrument's ledger entries
pub async fn get_transactions(
    Extension(state): Extension<Arc<AppState>>,
    Path(instrument_id): Path<Uuid>,
) -> ApiResult<Response> {
    // Verify the instrument exists before reading the shared ledger.
    state.service.instrument(instrument_id).await?;
    let transactions = state.service.transactions(instrument_id);
    Ok((StatusCode::OK, Json(transactions)).into_response())
}

/// List a new bond instrument
pub async fn create_instrument(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateInstrumentRequest>,
) -> ApiResult<Response> {
    let instrument = req.into_instrument();
    state.service.register_instrument(instrument.clone()).await?;
    Ok((StatusCode::CREATED, Json(instrument)).into_response())
}

/// Register a user account
pub async fn create_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Response> {
    let account = req.into_account();
    state.service.register_user(account.clone());
    Ok((StatusCode::CREATED, Json(account)).into_response())
}

/// Get a user's wallet and trade stats
pub async fn get_account(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Response> {
    let account = state.service.account(user_id)?;
    Ok((StatusCode::OK, Json(account)).into_response())
}

/// Run the expiry sweep across all instruments
pub async fn sweep_expired(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Response> {
    let expired = state.service.sweep_expired_orders().await?;
    Ok((StatusCode::OK, Json(SweepResponse { expired })).into_response())
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/low-stock", get(list_low_stock))
        .route("/:ipn", get(get_inventory))
        .route("/:ipn/transactions", get(list_transactions))
        .route("/:ipn/adjust", post(adjust_inventory))
        .route("/:ipn/reorder", put(set_reorder))
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    match services.core.ledger.list(dto::limit(query.limit)).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.core.ledger.low_stock().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(ipn): Path<String>,
) -> axum::response::Response {
    let ipn = match errors::parse_ipn(&ipn) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.ledger.get(&ipn).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Ledger history for one part, newest first.
pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(ipn): Path<String>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> axum::response::Response {
    let ipn = match errors::parse_ipn(&ipn) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    match services.core.ledger.transactions(&ipn, dto::limit(query.limit)).await {
        Ok(txns) => Json(txns).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn adjust_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(ipn): Path<String>,
    body: Result<Json<dto::AdjustRequest>, JsonRejection>,
) -> axum::response::Response {
    let ipn = match errors::parse_ipn(&ipn) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services
        .core
        .ledger
        .adjust(&ipn, body.qty_delta, &body.notes, actor.actor())
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(ipn): Path<String>,
    body: Result<Json<dto::ReorderRequest>, JsonRejection>,
) -> axum::response::Response {
    let ipn = match errors::parse_ipn(&ipn) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services
        .core
        .ledger
        .set_reorder_thresholds(&ipn, body.reorder_point, body.reorder_qty, actor.actor())
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

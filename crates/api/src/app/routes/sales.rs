use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use solderp_core::{InvoiceId, SalesOrderId};
use solderp_infra::{ServiceResult, audit};
use solderp_sales::{NewSalesOrder, OrderStatus, SalesOrder};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders_router())
        .nest("/invoices", invoices_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_sales_order).get(list_sales_orders))
        .route("/:id", get(get_sales_order))
        .route("/:id/confirm", post(confirm_sales_order))
        .route("/:id/allocate", post(allocate_sales_order))
        .route("/:id/pick", post(pick_sales_order))
        .route("/:id/ship", post(ship_sales_order))
        .route("/:id/invoice", post(invoice_sales_order).get(get_order_invoice))
        .route("/:id/shipment", get(get_order_shipment))
        .route("/:id/audit", get(get_order_audit))
}

fn invoices_router() -> Router {
    Router::new()
        .route("/:id", get(get_invoice))
        .route("/:id/recompute", post(recompute_invoice))
}

fn order_response(status: StatusCode, result: ServiceResult<SalesOrder>) -> axum::response::Response {
    match result {
        Ok(order) => (status, Json(order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<NewSalesOrder>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    order_response(StatusCode::CREATED, services.core.orders.create(body, actor.actor()).await)
}

pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListOrdersQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let status = match query.status.as_deref().map(str::parse::<OrderStatus>).transpose() {
        Ok(s) => s,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_status", e.to_string()),
    };

    match services.core.orders.list(status, dto::limit(query.limit)).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.orders.get(id).await)
}

pub async fn confirm_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.orders.confirm(id, actor.actor()).await)
}

pub async fn allocate_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.allocation.allocate(id, actor.actor()).await)
}

pub async fn pick_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.fulfillment.pick(id, actor.actor()).await)
}

pub async fn ship_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.fulfillment.ship(id, actor.actor()).await)
}

pub async fn invoice_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    order_response(StatusCode::OK, services.core.fulfillment.invoice(id, actor.actor()).await)
}

pub async fn get_order_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.fulfillment.shipment_for(id).await {
        Ok(shipment) => Json(shipment).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.fulfillment.invoice_for(id).await {
        Ok(invoice) => Json(invoice).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Transition history of one order, oldest first.
pub async fn get_order_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SalesOrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    if let Err(e) = services.core.orders.get(id).await {
        return errors::service_error_to_response(e);
    }
    match audit::entries_for(services.core.pool(), audit::MODULE_SALES, &id.to_string()).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match errors::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.fulfillment.get_invoice(id).await {
        Ok(invoice) => Json(invoice).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn recompute_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match errors::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.fulfillment.recompute_invoice(id, actor.actor()).await {
        Ok(invoice) => Json(invoice).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

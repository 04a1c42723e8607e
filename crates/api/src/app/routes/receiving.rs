use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use solderp_core::InspectionId;
use solderp_receiving::{Disposition, NewReceipt};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().nest("/inspections", inspections_router())
}

fn inspections_router() -> Router {
    Router::new()
        .route("/", post(record_receipt).get(list_inspections))
        .route("/:id", get(get_inspection))
        .route("/:id/ncrs", get(list_ncrs))
        .route("/:id/dispose", post(dispose_inspection))
}

pub async fn record_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<NewReceipt>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services.core.receiving.record_receipt(body, actor.actor()).await {
        Ok(inspection) => (StatusCode::CREATED, Json(inspection)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Only pending inspections are listable; decided ones are fetched by id.
pub async fn list_inspections(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListInspectionsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    if query.pending == Some(false) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unsupported_filter",
            "only pending inspections can be listed",
        );
    }
    match services.core.receiving.list_pending(dto::limit(query.limit)).await {
        Ok(inspections) => Json(inspections).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InspectionId = match errors::parse_id(&id, "inspection") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.receiving.get(id).await {
        Ok(inspection) => Json(inspection).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_ncrs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InspectionId = match errors::parse_id(&id, "inspection") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.core.receiving.ncrs_for(id).await {
        Ok(ncrs) => Json(ncrs).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// The disposition body names its own inspector; the `X-Actor` header does
/// not override it.
pub async fn dispose_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<Disposition>, JsonRejection>,
) -> axum::response::Response {
    let id: InspectionId = match errors::parse_id(&id, "inspection") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services.core.receiving.dispose(id, body).await {
        Ok(outcome) => Json(dto::DispositionResponse::from(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

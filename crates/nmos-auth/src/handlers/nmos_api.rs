//! Example NMOS API resources served behind the gates.
//!
//! These stand in for a real registry or node implementation: they list
//! their child resources and accept writes without persisting them.

use crate::auth::claims::Claims;
use axum::{extract::Path, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

/// GET /x-nmos/registration/v1.3/
pub async fn registration_root() -> Json<Value> {
    Json(json!(["resource/", "health/"]))
}

/// POST /x-nmos/registration/v1.3/resource
pub async fn register_resource(
    claims: Option<Extension<Claims>>,
    Json(resource): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let resource_type = resource
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    tracing::debug!(
        target: "auth.demo",
        resource_type = %resource_type,
        gated = claims.is_some(),
        "Resource registered"
    );
    (StatusCode::CREATED, Json(resource))
}

/// GET /x-nmos/query/v1.3/
pub async fn query_root() -> Json<Value> {
    Json(json!([
        "nodes/",
        "devices/",
        "sources/",
        "flows/",
        "senders/",
        "receivers/",
        "subscriptions/"
    ]))
}

/// GET /x-nmos/connection/v1.1/
pub async fn connection_root() -> Json<Value> {
    Json(json!(["bulk/", "single/"]))
}

/// PATCH /x-nmos/connection/v1.1/single/receivers/:id/staged
pub async fn stage_receiver(
    Path(receiver_id): Path<String>,
    Json(patch): Json<Value>,
) -> Json<Value> {
    tracing::debug!(target: "auth.demo", receiver_id = %receiver_id, "Receiver parameters staged");
    Json(patch)
}

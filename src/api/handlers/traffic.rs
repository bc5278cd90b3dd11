//! Current traffic counters

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::middleware::PushAuthorized;
use crate::api::server::AppState;
use crate::error::Result;

/// Cumulative bytes per port as the manager reports them right now
pub async fn traffic_snapshot(
    _auth: PushAuthorized,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let stat: BTreeMap<u16, u64> = state.sync.manager().stat().await?.into_iter().collect();
    Ok(Json(json!({ "traffic": stat })))
}

//! Pushed profile updates

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use crate::api::middleware::PushAuthorized;
use crate::api::server::AppState;
use crate::error::Result;

/// Apply a full profile list pushed by the panel.
///
/// The body has the same shape as the polled list; a single bad record
/// rejects the whole push.
#[instrument(skip_all)]
pub async fn push_profiles(
    _auth: PushAuthorized,
    State(state): State<AppState>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<Value>> {
    let applied = state.sync.apply_profiles(records).await?;
    Ok(Json(json!({ "applied": applied })))
}

//! Push token authentication
//!
//! The panel authenticates pushes with a shared token in the
//! `X-Push-Token` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::api::server::AppState;
use crate::error::YasspError;

pub const PUSH_TOKEN_HEADER: &str = "x-push-token";

/// Extractor that only succeeds for requests carrying the configured token
#[derive(Debug, Clone, Copy)]
pub struct PushAuthorized;

#[axum::async_trait]
impl FromRequestParts<AppState> for PushAuthorized {
    type Rejection = YasspError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(PUSH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(YasspError::Unauthorized)?;

        if token_matches(token, &state.token) {
            Ok(PushAuthorized)
        } else {
            debug!("Rejected push with wrong token");
            Err(YasspError::Unauthorized)
        }
    }
}

// Compares every byte so timing does not reveal the matching prefix length
fn token_matches(given: &str, expected: &str) -> bool {
    if expected.is_empty() || given.len() != expected.len() {
        return false;
    }
    given
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

//! Identity of the user behind a request.
//!
//! Authentication happens upstream; the console front end forwards the user id
//! in `X-DBC-User-ID`.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "X-DBC-User-ID";

/// User id taken from the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn user_id(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Actor(s.to_string()))
            .ok_or_else(|| ApiError::BadRequest(format!("Missing {} header", USER_ID_HEADER)))
    }
}

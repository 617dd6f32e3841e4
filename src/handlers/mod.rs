pub mod bookings;
pub mod health;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::{Identity, Role};

/// Pull the identity context installed by the upstream gateway out of the
/// request headers. The engine trusts these values; it performs no
/// authorization of its own.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if user_id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("customer");

    Ok(Identity {
        user_id: user_id.to_string(),
        role: Role::parse(role),
    })
}

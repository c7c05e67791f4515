// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request user middleware.
//!
//! Sessions are handled upstream; the authenticated user id arrives in the
//! `x-user-id` header and must be usable as a dataset folder name.

use crate::error::AppError;
use crate::store::is_valid_user_id;
use axum::{extract::Request, middleware::Next, response::Response};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts for.
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: String,
}

/// Middleware that requires a valid user id header.
pub async fn require_user(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;

    if !is_valid_user_id(&user_id) {
        return Err(AppError::BadRequest(format!("Invalid user id: {user_id:?}")));
    }

    request.extensions_mut().insert(RequestUser { user_id });
    Ok(next.run(request).await)
}

use crate::api::error::AppError;
use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Rejects the request with 401 unless it carries a valid token for a user
/// that still exists; otherwise the verified `Claims` are attached as an
/// extension for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    let Some(token) = token else {
        return Err(AppError::Unauthorized(
            "No token, authorization denied".to_string(),
        ));
    };

    let claims = validate_jwt(&token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized("Token is not valid".to_string())
    })?;

    // Check if user still exists in DB
    let user_exists = Users::find_by_id(claims.sub.clone())
        .one(&state.db)
        .await?
        .is_some();

    if !user_exists {
        return Err(AppError::Unauthorized("Token is not valid".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

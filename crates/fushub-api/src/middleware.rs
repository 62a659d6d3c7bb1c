use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use fushub_types::api::Claims;
use fushub_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, db_call};

/// The authenticated caller, inserted as a request extension by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
}

/// Extract the bearer token, validate it and check the session is still active.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let session = verify_token(&state, bearer.token()).await?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Decode a JWT and confirm its session has not been revoked.
/// Shared by the REST middleware and the realtime upgrade.
pub async fn verify_token(state: &AppState, token: &str) -> ApiResult<Session> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let claims = token_data.claims;
    let (sid, uid) = (claims.sid.to_string(), claims.sub.to_string());
    let active = db_call(state, move |db| db.session_is_active(&sid, &uid)).await?;
    if !active {
        return Err(ApiError::Unauthorized);
    }

    Ok(Session {
        user_id: claims.sub,
        session_id: claims.sid,
        role: claims.role,
    })
}

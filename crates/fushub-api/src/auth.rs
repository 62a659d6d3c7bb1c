use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use fushub_types::api::{AuthResponse, Claims, MeResponse, SignInRequest, SignUpRequest};
use fushub_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, blocking, db_call, mapping};

const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn signup(
    State(state): State<AppState>,
    Json(mut req): Json<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    req.email = normalize_email(&req.email);
    req.validate()?;
    let full_name = crate::profiles::validate_full_name(&req.full_name)?;

    let (email, password) = (req.email, req.password);
    let password_hash = blocking(move || hash_password(&password)).await?;
    let user_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    let (uid, sid, mail) = (user_id.to_string(), session_id.to_string(), email.clone());
    let role = req.role;
    let created = db_call(&state, move |db| {
        db.create_account(&uid, &mail, &password_hash, role, &full_name, &sid)
    })
    .await?;
    if !created {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    let token = create_token(&state.jwt_secret, user_id, session_id, role)?;
    info!("New {} account {} ({})", role, user_id, email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            role,
            token,
        }),
    ))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email);
    let user = db_call(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let (password, stored) = (req.password, user.password.clone());
    blocking(move || verify_password(&password, &stored)).await?;

    let user_id = mapping::uuid(&user.id, "user id");
    let session_id = Uuid::new_v4();

    let (uid, sid) = (user.id.clone(), session_id.to_string());
    let profile = db_call(&state, move |db| {
        db.create_session(&sid, &uid)?;
        db.get_profile(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound("profile"))?;

    let role = mapping::profile(profile).role;
    let token = create_token(&state.jwt_secret, user_id, session_id, role)?;

    Ok(Json(AuthResponse {
        user_id,
        role,
        token,
    }))
}

pub async fn signout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let sid = session.session_id.to_string();
    db_call(&state, move |db| db.revoke_session(&sid)).await?;
    state.dispatcher.revoke_session(session.session_id).await;
    info!("{} signed out (session {})", session.user_id, session.session_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let (user, profile) = db_call(&state, move |db| {
        Ok((db.get_user_by_id(&uid)?, db.get_profile(&uid)?))
    })
    .await?;

    let user = user.ok_or(ApiError::NotFound("user"))?;
    let profile = profile.ok_or(ApiError::NotFound("profile"))?;

    Ok(Json(MeResponse {
        user_id: session.user_id,
        email: user.email,
        profile: mapping::profile(profile),
    }))
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> ApiResult<()> {
    let parsed_hash =
        PasswordHash::new(stored).map_err(|e| ApiError::Internal(anyhow::anyhow!("{}", e)))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)
}

fn create_token(secret: &str, user_id: Uuid, session_id: Uuid, role: Role) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        sid: session_id,
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

/// Lower-cased and trimmed. Shape is checked by `SignUpRequest::validate`.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_request(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: normalize_email(email),
            password: "correct horse".into(),
            full_name: "Ana Souza".into(),
            role: Role::Tenant,
        }
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Uni.BR "), "ana@uni.br");
        assert!(signup_request("  Ana@Uni.BR ").validate().is_ok());
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["ana", "@uni.br", "a na@uni.br", "a@@b.c", "a@b..c", "a@b@c.d", "a\"@x.y"] {
            let err = ApiError::from(signup_request(email).validate().unwrap_err());
            assert_eq!(err.code(), "validation_error", "{email} should be rejected");
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(ApiError::InvalidCredentials)
        ));
    }
}

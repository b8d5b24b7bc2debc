use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthRequest, AuthResponse, EmailQuery, MessageResponse, PublicUser,
            ResetPasswordQuery, TokenQuery,
        },
        error::AuthError,
        jwt::AuthUser,
        repo_types::ProfileUpdate,
        services::is_valid_email,
    },
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/authentication/register", post(register))
        .route("/authentication/login", post(login))
        .route(
            "/authentication/send-password-reset-token",
            put(send_password_reset_token),
        )
        .route("/authentication/reset-password", put(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/authentication/user", get(get_user))
        .route("/authentication/delete", delete(delete_user))
        .route("/authentication/profile", put(update_profile))
        .route(
            "/authentication/send-email-verification-token",
            get(send_email_verification_token),
        )
        .route(
            "/authentication/validate-email-verification-token",
            put(validate_email_verification_token),
        )
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::BadRequest("Invalid email".into()));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email)?;
    check_password(&payload.password)?;

    let grant = state.auth.register(&email, &payload.password).await?;
    Ok(Json(AuthResponse {
        token: grant.token,
        message: grant.message.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(AuthError::BadRequest("Password is mandatory".into()));
    }

    let grant = state.auth.login(&email, &payload.password).await?;
    Ok(Json(AuthResponse {
        token: grant.token,
        message: grant.message.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.auth.get_user(&email).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    let user = state.auth.get_user(&email).await?;
    state.auth.delete_user(user.id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully.")))
}

#[instrument(skip(state, update))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    update: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<PublicUser>, AuthError> {
    let Json(update) = update?;
    let user = state.auth.get_user(&email).await?;
    let user = state.auth.update_profile(user.id, update).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn send_email_verification_token(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.send_email_verification_token(&email).await?;
    Ok(Json(MessageResponse::new(
        "Email verification token sent successfully.",
    )))
}

#[instrument(skip(state, query))]
pub async fn validate_email_verification_token(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let Query(query) = query?;
    state
        .auth
        .validate_email_verification_token(query.token.trim(), &email)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("Email verified successfully.")),
    ))
}

#[instrument(skip(state, query))]
pub async fn send_password_reset_token(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Query(query) = query?;
    let email = normalize_email(&query.email)?;
    state.auth.send_password_reset_token(&email).await?;
    Ok(Json(MessageResponse::new(format!(
        "Password reset token sent to {}",
        email
    ))))
}

#[instrument(skip(state, query))]
pub async fn reset_password(
    State(state): State<AppState>,
    query: Result<Query<ResetPasswordQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Query(query) = query?;
    let email = normalize_email(&query.email)?;
    check_password(&query.new_password)?;
    state
        .auth
        .reset_password(&email, &query.new_password, query.token.trim())
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        let err = normalize_email("not-an-email").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_short_password() {
        let err = check_password("1234567").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 8 characters");
        assert!(check_password("12345678").is_ok());
    }

    #[test]
    fn public_user_serialization_hides_hash() {
        use crate::auth::repo_types::{Profile, User};

        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            email_verified: false,
            email_verification: None,
            password_reset: None,
            profile: Profile::default(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"profileComplete\":false"));
        assert!(!json.contains("argon2"));
    }
}

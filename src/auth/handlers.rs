//! Authentication API handlers

use crate::api::handlers::AppState;
use crate::api::validation::validate_body;
use crate::auth::middleware::AuthUser;
use crate::auth::models::{
    MessageResponse, SessionUser, SigninRequest, SignupRequest, SignupResponse,
};
use crate::core::error::{Result, WardenError};
use crate::db::models::PublicUser;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

/// Handler for POST /auth/signup - User registration
pub async fn signup(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let req: SignupRequest = validate_body(&body)
        .into_result()
        .map_err(WardenError::ValidationError)?;

    tracing::info!(email = %req.email, role = %req.role, "User registration attempt");

    let user = state.authenticator.signup(req).await?;

    Ok((StatusCode::CREATED, Json(SignupResponse::from(user))))
}

/// Handler for POST /auth/signin - Credential check and session cookie
pub async fn signin(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let req: SigninRequest = validate_body(&body)
        .into_result()
        .map_err(WardenError::ValidationError)?;

    tracing::info!(email = %req.email, "Signin attempt");

    let signed_in = state.authenticator.signin(req).await?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, state.cookies.session_cookie(&signed_in.token));

    Ok((
        StatusCode::OK,
        headers,
        Json(SessionUser::from(signed_in.user)),
    ))
}

/// Handler for POST /auth/signout - Clear the session cookie
///
/// Sessions are stateless, so this always succeeds.
pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, state.cookies.clear_cookie());

    (
        StatusCode::OK,
        headers,
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
}

/// Handler for GET /auth/me - Current session's account
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<PublicUser>> {
    tracing::debug!(user_id = %user.id, "Getting current user info");

    let account = state.authenticator.current_user(&user.id).await?;
    Ok(Json(account))
}

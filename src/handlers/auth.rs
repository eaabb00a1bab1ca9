use axum::{extract::State, response::Json};

use crate::{
    errors::Result,
    handlers::AppState,
    models::{
        AccountIdResponse, AuthResponse, CreateAccountRequest, SignInRequest, VerifyOtpRequest,
    },
    utils::validation::{validate_email, validate_full_name},
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountIdResponse>> {
    let email = normalize_email(&request.email);
    validate_email(&email)?;
    validate_full_name(&request.full_name)?;

    let account_id = state
        .users
        .create_account(request.full_name.trim(), &email)
        .await?;

    Ok(Json(AccountIdResponse { account_id }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AccountIdResponse>> {
    let email = normalize_email(&request.email);
    validate_email(&email)?;

    let account_id = state.users.sign_in(&email).await?;

    Ok(Json(AccountIdResponse { account_id }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>> {
    let (session, user) = state
        .users
        .verify_otp(&request.account_id, request.otp.trim())
        .await?;

    tracing::info!(user_id = %user.id, session_id = %session.id, "User signed in");

    let access_token = state.jwt.generate_access_token(&user)?;

    Ok(Json(AuthResponse { access_token, user }))
}

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{errors::AppError, handlers::AppState, models::User};

/// The user behind a verified bearer token.
///
/// Handlers take this explicitly and pass the user on to the services.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Auth("Authentication required".to_string()))?;

        let claims = state.jwt.verify_access_token(token)?;
        let user = state.users.get_current_user(&claims.email).await?;

        if user.id != claims.sub {
            return Err(AppError::Auth("Session is no longer valid".to_string()));
        }

        Ok(AuthenticatedUser(user))
    }
}

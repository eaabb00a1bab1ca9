use axum::response::Json;

use crate::{errors::Result, middleware::auth::AuthenticatedUser, models::User};

pub async fn current_user(AuthenticatedUser(user): AuthenticatedUser) -> Result<Json<User>> {
    Ok(Json(user))
}

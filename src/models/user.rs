use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user document from the users collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "$id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "avatar")]
    pub avatar_url: String,
    pub account_id: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Attributes written when a user document is created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    #[serde(rename = "avatar")]
    pub avatar_url: String,
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub account_id: String,
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountIdResponse {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

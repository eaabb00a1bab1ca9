use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User document ID
    pub account_id: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issues the bearer token handed out after a successful OTP verification.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_duration: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            access_token_duration: Duration::days(7),
        }
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            account_id: user.account_id.clone(),
            email: user.email.clone(),
            exp: (now + self.access_token_duration).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Auth(format!("Failed to generate access token: {}", e)))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            full_name: "Ada Lovelace".to_string(),
            email: "a@x.com".to_string(),
            avatar_url: String::new(),
            account_id: "acc-1".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_jwt_generation_and_verification() {
        let jwt_service = JwtService::new("test-secret");

        let token = jwt_service.generate_access_token(&user()).unwrap();
        let claims = jwt_service.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.account_id, "acc-1");
        assert_eq!(claims.email, "a@x.com");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = JwtService::new("one").generate_access_token(&user()).unwrap();
        let result = JwtService::new("two").verify_access_token(&token);
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}

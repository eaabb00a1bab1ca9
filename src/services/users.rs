use crate::{
    backend::{unique_id, BackendClient, BackendError, Query, Session},
    config::Config,
    errors::{AppError, Result},
    models::{NewUser, User},
    services::handle_error,
};

/// Passwordless account flow: user lookup, OTP issuance and idempotent sign-up.
#[derive(Clone)]
pub struct UserAccountService {
    backend: BackendClient,
    database_id: String,
    users_collection_id: String,
    default_avatar_url: String,
}

impl UserAccountService {
    pub fn new(backend: BackendClient, config: &Config) -> Self {
        Self {
            backend,
            database_id: config.backend.database_id.clone(),
            users_collection_id: config.backend.users_collection_id.clone(),
            default_avatar_url: config.default_avatar_url.clone(),
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let result = self
            .backend
            .databases
            .list_documents(
                &self.database_id,
                &self.users_collection_id,
                &[Query::equal("email", [email]), Query::limit(1)],
            )
            .await
            .map_err(handle_error("Failed to look up user by email."))?;

        match result.documents.into_iter().next() {
            Some(document) => Ok(Some(document.decode()?)),
            None => Ok(None),
        }
    }

    /// Asks the backend to email a one-time code; returns the account id the
    /// code is bound to.
    pub async fn send_email_otp(&self, email: &str) -> Result<String> {
        let token = self
            .backend
            .account
            .create_email_token(&unique_id(), email)
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Failed to send email OTP.");
                AppError::OtpDispatch(error)
            })?;

        if token.user_id.is_empty() {
            return Err(AppError::OtpDispatch(BackendError::Unavailable(
                "backend returned no account id".to_string(),
            )));
        }

        Ok(token.user_id)
    }

    /// Shared sign-up/sign-in entry point.
    ///
    /// An OTP is always requested; the user document is only created when no
    /// user with this email exists, and only after the OTP was issued.
    pub async fn create_account(&self, full_name: &str, email: &str) -> Result<String> {
        let existing_user = self.get_user_by_email(email).await?;

        let account_id = self.send_email_otp(email).await?;

        if existing_user.is_none() {
            let new_user = NewUser {
                full_name: full_name.to_string(),
                email: email.to_string(),
                avatar_url: self.default_avatar_url.clone(),
                account_id: account_id.clone(),
            };
            let data = serde_json::to_value(&new_user).map_err(BackendError::from)?;

            match self
                .backend
                .databases
                .create_document(
                    &self.database_id,
                    &self.users_collection_id,
                    &unique_id(),
                    data,
                )
                .await
            {
                Ok(document) => {
                    tracing::info!(user_id = %document.id, "Created user account");
                }
                // Lost a race with a concurrent sign-up for the same email.
                Err(error) if error.is_conflict() => {
                    tracing::info!("User already exists; continuing as sign-in");
                }
                Err(error) => return Err(handle_error("Failed to create user document.")(error)),
            }
        }

        Ok(account_id)
    }

    pub async fn sign_in(&self, email: &str) -> Result<String> {
        if self.get_user_by_email(email).await?.is_none() {
            return Err(AppError::UserNotFound);
        }

        self.send_email_otp(email).await
    }

    /// Exchanges a one-time code for a session and resolves its user.
    pub async fn verify_otp(&self, account_id: &str, otp: &str) -> Result<(Session, User)> {
        let session = self
            .backend
            .account
            .create_session(account_id, otp)
            .await
            .map_err(|error| match error {
                BackendError::Api { code: 401, .. } | BackendError::NotFound(_) => {
                    AppError::Auth("Invalid or expired one-time code".to_string())
                }
                other => handle_error("Failed to verify OTP.")(other),
            })?;

        let user = self.get_current_user(&session.provider_uid).await?;

        Ok((session, user))
    }

    /// Resolves the user behind a verified identity.
    pub async fn get_current_user(&self, email: &str) -> Result<User> {
        self.get_user_by_email(email)
            .await?
            .ok_or(AppError::UserNotFound)
    }
}

use crate::{
    auth::JwtService,
    backend::BackendClient,
    config::Config,
    services::{FileService, RevalidationLog, UserAccountService},
};
use std::sync::Arc;

pub mod auth;
pub mod files;
pub mod health;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: UserAccountService,
    pub files: FileService,
    pub revalidations: Arc<RevalidationLog>,
    pub jwt: Arc<JwtService>,
}

impl AppState {
    pub fn new(config: Config, backend: BackendClient) -> Self {
        let revalidations = Arc::new(RevalidationLog::new());

        Self {
            users: UserAccountService::new(backend.clone(), &config),
            files: FileService::new(backend, &config, revalidations.clone()),
            jwt: Arc::new(JwtService::new(&config.jwt_secret)),
            revalidations,
            config,
        }
    }
}

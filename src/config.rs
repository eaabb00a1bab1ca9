use anyhow::{bail, Result};
use serde::Deserialize;
use std::env;

pub const DEFAULT_AVATAR_URL: &str =
    "https://img.freepik.com/free-psd/3d-illustration-person-with-sunglasses_23-2149436188.jpg";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub max_file_size: usize,
    pub jwt_secret: String,
    pub default_avatar_url: String,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Memory,
    Rest,
}

/// Connection settings and resource identifiers for the document/blob backend.
///
/// Collection and bucket ids belong to the backend's own configuration; this
/// service only passes them through.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub endpoint: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub database_id: String,
    pub users_collection_id: String,
    pub files_collection_id: String,
    pub bucket_id: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            max_file_size: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "52428800".to_string()) // 50MB
                .parse()?,
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "your-secret-key".to_string()),
            default_avatar_url: env::var("DEFAULT_AVATAR_URL")
                .unwrap_or_else(|_| DEFAULT_AVATAR_URL.to_string()),
            backend: BackendConfig::from_env()?,
        };

        Ok(config)
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        let mode = match env::var("BACKEND_MODE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => BackendMode::Memory,
            "rest" => BackendMode::Rest,
            other => bail!("Unsupported backend mode: {}", other),
        };

        let config = BackendConfig {
            mode,
            endpoint: env::var("APPWRITE_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            project_id: env::var("APPWRITE_PROJECT")
                .unwrap_or_else(|_| "file-storage".to_string()),
            api_key: env::var("APPWRITE_KEY").ok(),
            database_id: env::var("APPWRITE_DATABASE")
                .unwrap_or_else(|_| "storage".to_string()),
            users_collection_id: env::var("APPWRITE_USERS_COLLECTION")
                .unwrap_or_else(|_| "users".to_string()),
            files_collection_id: env::var("APPWRITE_FILES_COLLECTION")
                .unwrap_or_else(|_| "files".to_string()),
            bucket_id: env::var("APPWRITE_BUCKET")
                .unwrap_or_else(|_| "uploads".to_string()),
            timeout_secs: env::var("BACKEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        if config.mode == BackendMode::Rest && config.api_key.is_none() {
            bail!("APPWRITE_KEY must be set when BACKEND_MODE=rest");
        }

        Ok(config)
    }

    /// Builds the public view URL for a stored blob.
    pub fn file_url(&self, blob_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.endpoint, self.bucket_id, blob_id, self.project_id
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Memory,
            endpoint: "http://localhost/v1".to_string(),
            project_id: "file-storage".to_string(),
            api_key: None,
            database_id: "storage".to_string(),
            users_collection_id: "users".to_string(),
            files_collection_id: "files".to_string(),
            bucket_id: "uploads".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            max_file_size: 50 * 1024 * 1024,
            jwt_secret: "your-secret-key".to_string(),
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
            backend: BackendConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_is_derived_from_blob_id() {
        let config = BackendConfig::default();
        assert_eq!(
            config.file_url("abc123"),
            "http://localhost/v1/storage/buckets/uploads/files/abc123/view?project=file-storage"
        );
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{BackendConfig, BackendMode};
use crate::errors::AppError;

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

pub use error::{BackendError, Result};
pub use memory::InMemoryBackend;
pub use query::Query;
pub use rest::RestBackend;

/// Generates a new identifier accepted by the backend as a custom id.
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A stored document: backend metadata plus the flat attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentList<T = Document> {
    pub total: u64,
    pub documents: Vec<T>,
}

impl DocumentList<Document> {
    pub fn decode<T: DeserializeOwned>(self) -> Result<DocumentList<T>> {
        let documents = self
            .documents
            .into_iter()
            .map(Document::decode)
            .collect::<Result<Vec<T>>>()?;

        Ok(DocumentList {
            total: self.total,
            documents,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "sizeOriginal")]
    pub size_original: u64,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailToken {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub expire: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    /// For email-token sessions this is the verified email address.
    #[serde(rename = "providerUid")]
    pub provider_uid: String,
    pub expire: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document>;

    async fn get_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<Document>;

    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document>;

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList>;

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()>;
}

/// Page size used when a listing has to be read in full.
pub const LIST_PAGE_SIZE: usize = 100;

/// Reads every document matching `queries`, following `cursorAfter` pages of
/// `page_size` until the backend has nothing more to return.
///
/// The backend caps a single listing (25 documents unless told otherwise), so
/// one `list_documents` call can report a `total` larger than what it returned.
pub async fn list_all_documents(
    store: &dyn DocumentStore,
    database_id: &str,
    collection_id: &str,
    queries: &[Query],
    page_size: usize,
) -> Result<DocumentList> {
    let page_size = page_size.max(1);
    let mut documents: Vec<Document> = Vec::new();

    loop {
        let mut page_queries = queries.to_vec();
        page_queries.push(Query::limit(page_size));
        if let Some(last) = documents.last() {
            page_queries.push(Query::cursor_after(&last.id));
        }

        let page = store
            .list_documents(database_id, collection_id, &page_queries)
            .await?;
        let received = page.documents.len();
        documents.extend(page.documents);

        if received < page_size || documents.len() as u64 >= page.total {
            break;
        }
    }

    Ok(DocumentList {
        total: documents.len() as u64,
        documents,
    })
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobDescriptor>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()>;
}

/// Issues email one-time codes and exchanges them for sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken>;

    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session>;
}

/// Authenticated handle to the document database, blob store and account API.
#[derive(Clone)]
pub struct BackendClient {
    pub databases: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn BlobStore>,
    pub account: Arc<dyn SessionIssuer>,
}

impl BackendClient {
    pub fn new(
        databases: Arc<dyn DocumentStore>,
        storage: Arc<dyn BlobStore>,
        account: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            databases,
            storage,
            account,
        }
    }

    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DocumentStore + BlobStore + SessionIssuer + 'static,
    {
        Self {
            databases: backend.clone(),
            storage: backend.clone(),
            account: backend,
        }
    }
}

pub fn create_admin_client(
    config: &BackendConfig,
) -> std::result::Result<BackendClient, AppError> {
    match config.mode {
        BackendMode::Memory => {
            tracing::warn!("Using in-memory backend; data will not survive a restart");
            let backend = InMemoryBackend::new().with_unique_index(
                &config.database_id,
                &config.users_collection_id,
                "email",
            );
            Ok(BackendClient::from_backend(Arc::new(backend)))
        }
        BackendMode::Rest => {
            let backend = RestBackend::new(config)?;
            tracing::info!(endpoint = %config.endpoint, "Using REST backend");
            Ok(BackendClient::from_backend(Arc::new(backend)))
        }
    }
}

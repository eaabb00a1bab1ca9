use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{
    unique_id, BackendError, BlobDescriptor, BlobStore, Document, DocumentList, DocumentStore,
    EmailToken, Query, Result, Session, SessionIssuer,
};

const TOKEN_TTL_MINUTES: i64 = 15;
// Page size when a listing carries no limit, as on the real backend.
const DEFAULT_LIST_LIMIT: usize = 25;

/// Backend operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDocument,
    GetDocument,
    UpdateDocument,
    ListDocuments,
    DeleteDocument,
    CreateFile,
    DeleteFile,
    CreateEmailToken,
    CreateSession,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    name: String,
    bytes: Vec<u8>,
    mime_type: String,
}

#[derive(Debug, Clone)]
struct PendingToken {
    email: String,
    secret: String,
    expire: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    blobs: HashMap<(String, String), StoredBlob>,
    tokens: HashMap<String, PendingToken>,
    // Latest code delivered per email address.
    outbox: HashMap<String, String>,
    faults: HashSet<Operation>,
}

/// In-process backend with the same contract as the REST backend.
///
/// Email delivery is simulated: the code is written to the log at info level
/// and the latest code per address can be read back with
/// [`InMemoryBackend::last_code_for`]. Issuing a code supersedes any pending
/// code for the same address and drops expired ones.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    unique_indexes: Vec<(String, String)>,
}

fn collection_key(database_id: &str, collection_id: &str) -> String {
    format!("{}/{}", database_id, collection_id)
}

fn as_object(data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Api {
            code: 400,
            kind: "document_invalid_structure".to_string(),
            message: format!("Document data must be an object, got {}", other),
        }),
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects creation of a second document with the same `attribute` value.
    pub fn with_unique_index(
        mut self,
        database_id: &str,
        collection_id: &str,
        attribute: &str,
    ) -> Self {
        self.unique_indexes
            .push((collection_key(database_id, collection_id), attribute.to_string()));
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent call of `operation` fail until [`restore`](Self::restore).
    pub fn fail(&self, operation: Operation) {
        self.state().faults.insert(operation);
    }

    pub fn restore(&self, operation: Operation) {
        self.state().faults.remove(&operation);
    }

    pub fn documents(&self, database_id: &str, collection_id: &str) -> Vec<Document> {
        self.state()
            .collections
            .get(&collection_key(database_id, collection_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_blob(&self, bucket_id: &str, file_id: &str) -> bool {
        self.state()
            .blobs
            .contains_key(&(bucket_id.to_string(), file_id.to_string()))
    }

    pub fn blob_count(&self, bucket_id: &str) -> usize {
        self.state()
            .blobs
            .keys()
            .filter(|(bucket, _)| bucket == bucket_id)
            .count()
    }

    /// The most recent one-time code delivered to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.state().outbox.get(email).cloned()
    }

    fn check(state: &State, operation: Operation) -> Result<()> {
        if state.faults.contains(&operation) {
            return Err(BackendError::Unavailable(format!(
                "simulated failure of {:?}",
                operation
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryBackend {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let data = as_object(data)?;
        let key = collection_key(database_id, collection_id);
        let mut state = self.state();
        Self::check(&state, Operation::CreateDocument)?;

        let documents = state.collections.entry(key.clone()).or_default();
        if documents.iter().any(|doc| doc.id == document_id) {
            return Err(BackendError::Conflict(format!(
                "Document {} already exists in {}",
                document_id, key
            )));
        }

        for (index_key, attribute) in &self.unique_indexes {
            if *index_key != key {
                continue;
            }
            if let Some(value) = data.get(attribute) {
                if documents.iter().any(|doc| doc.data.get(attribute) == Some(value)) {
                    return Err(BackendError::Conflict(format!(
                        "Unique index on {}.{} violated",
                        key, attribute
                    )));
                }
            }
        }

        let now = Utc::now();
        let document = Document {
            id: document_id.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            data,
        };
        documents.push(document.clone());

        Ok(document)
    }

    async fn get_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<Document> {
        let key = collection_key(database_id, collection_id);
        let state = self.state();
        Self::check(&state, Operation::GetDocument)?;

        state
            .collections
            .get(&key)
            .and_then(|docs| docs.iter().find(|doc| doc.id == document_id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Document {} in {}", document_id, key)))
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let changes = as_object(data)?;
        let key = collection_key(database_id, collection_id);
        let mut state = self.state();
        Self::check(&state, Operation::UpdateDocument)?;

        let document = state
            .collections
            .get_mut(&key)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == document_id))
            .ok_or_else(|| BackendError::NotFound(format!("Document {} in {}", document_id, key)))?;

        document.data.extend(changes);
        document.updated_at = Some(Utc::now());

        Ok(document.clone())
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList> {
        let state = self.state();
        Self::check(&state, Operation::ListDocuments)?;

        let matching: Vec<&Document> = state
            .collections
            .get(&collection_key(database_id, collection_id))
            .map(|docs| {
                docs.iter()
                    .filter(|doc| queries.iter().all(|query| query.matches(&doc.data)))
                    .collect()
            })
            .unwrap_or_default();
        let total = matching.len() as u64;

        let start = match queries.iter().find_map(Query::cursor) {
            Some(cursor) => matching
                .iter()
                .position(|doc| doc.id == cursor)
                .map(|index| index + 1)
                .ok_or_else(|| BackendError::Api {
                    code: 400,
                    kind: "document_not_found".to_string(),
                    message: format!("Cursor document {} not found", cursor),
                })?,
            None => 0,
        };
        let limit = queries
            .iter()
            .find_map(Query::page_limit)
            .unwrap_or(DEFAULT_LIST_LIMIT);

        let documents = matching
            .into_iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect();

        Ok(DocumentList { total, documents })
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let key = collection_key(database_id, collection_id);
        let mut state = self.state();
        Self::check(&state, Operation::DeleteDocument)?;

        let documents = state
            .collections
            .get_mut(&key)
            .ok_or_else(|| BackendError::NotFound(format!("Collection {}", key)))?;
        let before = documents.len();
        documents.retain(|doc| doc.id != document_id);

        if documents.len() == before {
            return Err(BackendError::NotFound(format!(
                "Document {} in {}",
                document_id, key
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryBackend {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobDescriptor> {
        let mut state = self.state();
        Self::check(&state, Operation::CreateFile)?;

        let key = (bucket_id.to_string(), file_id.to_string());
        if state.blobs.contains_key(&key) {
            return Err(BackendError::Conflict(format!(
                "File {} already exists in bucket {}",
                file_id, bucket_id
            )));
        }

        let blob = StoredBlob {
            name: file_name.to_string(),
            mime_type: mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string(),
            bytes,
        };
        let descriptor = BlobDescriptor {
            id: file_id.to_string(),
            name: blob.name.clone(),
            size_original: blob.bytes.len() as u64,
            mime_type: blob.mime_type.clone(),
        };
        state.blobs.insert(key, blob);

        Ok(descriptor)
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        let mut state = self.state();
        Self::check(&state, Operation::DeleteFile)?;

        state
            .blobs
            .remove(&(bucket_id.to_string(), file_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                BackendError::NotFound(format!("File {} in bucket {}", file_id, bucket_id))
            })
    }
}

#[async_trait]
impl SessionIssuer for InMemoryBackend {
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken> {
        let mut state = self.state();
        Self::check(&state, Operation::CreateEmailToken)?;

        let secret = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let now = Utc::now();
        let expire = now + Duration::minutes(TOKEN_TTL_MINUTES);

        state
            .tokens
            .retain(|_, pending| pending.expire > now && pending.email != email);
        state.tokens.insert(
            user_id.to_string(),
            PendingToken {
                email: email.to_string(),
                secret: secret.clone(),
                expire,
            },
        );
        tracing::info!(
            email,
            user_id,
            code = %secret,
            "Simulated email delivery of one-time code"
        );
        state.outbox.insert(email.to_string(), secret);

        Ok(EmailToken {
            id: unique_id(),
            user_id: user_id.to_string(),
            expire,
        })
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session> {
        let mut state = self.state();
        Self::check(&state, Operation::CreateSession)?;

        let invalid = || BackendError::Api {
            code: 401,
            kind: "user_invalid_token".to_string(),
            message: "Invalid token passed in the request.".to_string(),
        };

        let token = state.tokens.get(user_id).cloned().ok_or_else(invalid)?;
        if token.expire < Utc::now() {
            state.tokens.remove(user_id);
            return Err(invalid());
        }
        if token.secret != secret {
            return Err(invalid());
        }

        // One-time use.
        state.tokens.remove(user_id);

        Ok(Session {
            id: unique_id(),
            user_id: user_id.to_string(),
            provider_uid: token.email,
            expire: Utc::now() + Duration::days(365),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_document_lifecycle() {
        let backend = InMemoryBackend::new();

        let created = backend
            .create_document("db", "files", "f1", json!({"name": "a.txt", "owner": "u1"}))
            .await
            .unwrap();
        assert_eq!(created.id, "f1");
        assert!(created.created_at.is_some());

        let updated = backend
            .update_document("db", "files", "f1", json!({"name": "b.txt"}))
            .await
            .unwrap();
        assert_eq!(updated.data["name"], "b.txt");
        assert_eq!(updated.data["owner"], "u1");

        let listed = backend
            .list_documents("db", "files", &[Query::equal("owner", ["u1"])])
            .await
            .unwrap();
        assert_eq!(listed.total, 1);

        backend.delete_document("db", "files", "f1").await.unwrap();
        assert!(backend.documents("db", "files").is_empty());
        assert!(backend
            .delete_document("db", "files", "f1")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let backend = InMemoryBackend::new().with_unique_index("db", "users", "email");

        backend
            .create_document("db", "users", "u1", json!({"email": "a@x.com"}))
            .await
            .unwrap();
        let err = backend
            .create_document("db", "users", "u2", json!({"email": "a@x.com"}))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(backend.documents("db", "users").len(), 1);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let backend = InMemoryBackend::new();
        backend.fail(Operation::CreateFile);

        let err = backend
            .create_file("bucket", "b1", "a.txt", b"hi".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert_eq!(backend.blob_count("bucket"), 0);

        backend.restore(Operation::CreateFile);
        let blob = backend
            .create_file("bucket", "b1", "a.txt", b"hi".to_vec())
            .await
            .unwrap();
        assert_eq!(blob.size_original, 2);
        assert_eq!(blob.mime_type, "text/plain");
        assert!(backend.has_blob("bucket", "b1"));
    }

    #[tokio::test]
    async fn test_email_token_is_single_use() {
        let backend = InMemoryBackend::new();

        let token = backend.create_email_token("acc1", "a@x.com").await.unwrap();
        let code = backend.last_code_for("a@x.com").unwrap();
        assert_eq!(code.len(), 6);

        assert!(backend.create_session(&token.user_id, "not-it").await.is_err());

        let session = backend.create_session(&token.user_id, &code).await.unwrap();
        assert_eq!(session.user_id, "acc1");
        assert_eq!(session.provider_uid, "a@x.com");

        assert!(backend.create_session(&token.user_id, &code).await.is_err());
    }

    #[tokio::test]
    async fn test_listing_is_paged() {
        let backend = InMemoryBackend::new();
        for i in 0..30 {
            backend
                .create_document("db", "files", &format!("f{:02}", i), json!({"owner": "u1"}))
                .await
                .unwrap();
        }

        let first = backend.list_documents("db", "files", &[]).await.unwrap();
        assert_eq!(first.total, 30);
        assert_eq!(first.documents.len(), 25);

        let rest = backend
            .list_documents(
                "db",
                "files",
                &[Query::limit(10), Query::cursor_after("f24")],
            )
            .await
            .unwrap();
        assert_eq!(rest.total, 30);
        let ids: Vec<_> = rest.documents.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["f25", "f26", "f27", "f28", "f29"]);
    }

    #[tokio::test]
    async fn test_get_document() {
        let backend = InMemoryBackend::new();
        backend
            .create_document("db", "files", "f1", json!({"name": "a.txt"}))
            .await
            .unwrap();

        let found = backend.get_document("db", "files", "f1").await.unwrap();
        assert_eq!(found.data["name"], "a.txt");
        assert!(backend
            .get_document("db", "files", "missing")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_pending_codes_stay_bounded() {
        let backend = InMemoryBackend::new();

        for _ in 0..20 {
            backend
                .create_email_token(&unique_id(), "a@x.com")
                .await
                .unwrap();
        }
        let latest = backend.create_email_token("acc-last", "a@x.com").await.unwrap();
        backend.create_email_token("acc-b", "b@x.com").await.unwrap();

        {
            let state = backend.state();
            assert_eq!(state.tokens.len(), 2);
            assert_eq!(state.outbox.len(), 2);
        }

        let code = backend.last_code_for("a@x.com").unwrap();
        assert!(backend.create_session(&latest.user_id, &code).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_codes_are_dropped_on_issue() {
        let backend = InMemoryBackend::new();
        backend.state().tokens.insert(
            "stale".to_string(),
            PendingToken {
                email: "old@x.com".to_string(),
                secret: "123456".to_string(),
                expire: Utc::now() - Duration::minutes(1),
            },
        );

        backend.create_email_token("acc1", "a@x.com").await.unwrap();

        let state = backend.state();
        assert!(!state.tokens.contains_key("stale"));
        assert_eq!(state.tokens.len(), 1);
    }
}

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::backend::{
    BackendError, BlobDescriptor, BlobStore, Document, DocumentList, DocumentStore, EmailToken,
    Query, Result, Session, SessionIssuer,
};
use crate::config::BackendConfig;
use crate::errors::AppError;

/// Client for an Appwrite-compatible REST API, authenticated with a server key.
pub struct RestBackend {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> std::result::Result<Self, AppError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Backend API key is not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Appwrite-Project",
            HeaderValue::from_str(&config.project_id)
                .map_err(|e| AppError::Config(format!("Invalid project id: {}", e)))?,
        );
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| AppError::Config(format!("Invalid API key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert("X-Appwrite-Key", key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn documents_path(database_id: &str, collection_id: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            database_id, collection_id
        )
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), kind = %body.kind, "Backend request rejected");

        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(body.message),
            StatusCode::CONFLICT => BackendError::Conflict(body.message),
            _ => BackendError::Api {
                code: status.as_u16(),
                kind: body.kind,
                message: body.message,
            },
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        Self::check_status(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RestBackend {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let request = self
            .client
            .post(self.url(&Self::documents_path(database_id, collection_id)))
            .json(&json!({ "documentId": document_id, "data": data }));
        self.send(request).await
    }

    async fn get_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<Document> {
        let path = format!(
            "{}/{}",
            Self::documents_path(database_id, collection_id),
            document_id
        );
        self.send(self.client.get(self.url(&path))).await
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let path = format!(
            "{}/{}",
            Self::documents_path(database_id, collection_id),
            document_id
        );
        let request = self.client.patch(self.url(&path)).json(&json!({ "data": data }));
        self.send(request).await
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList> {
        let params = queries
            .iter()
            .map(|query| serde_json::to_string(query).map(|encoded| ("queries[]", encoded)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let request = self
            .client
            .get(self.url(&Self::documents_path(database_id, collection_id)))
            .query(&params);
        self.send(request).await
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let path = format!(
            "{}/{}",
            Self::documents_path(database_id, collection_id),
            document_id
        );
        self.send_empty(self.client.delete(self.url(&path))).await
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobDescriptor> {
        let mime_type = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type.as_ref())?;
        let form = Form::new().text("fileId", file_id.to_string()).part("file", part);

        let request = self
            .client
            .post(self.url(&format!("/storage/buckets/{}/files", bucket_id)))
            .multipart(form);
        self.send(request).await
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        let path = format!("/storage/buckets/{}/files/{}", bucket_id, file_id);
        self.send_empty(self.client.delete(self.url(&path))).await
    }
}

#[async_trait]
impl SessionIssuer for RestBackend {
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken> {
        let request = self
            .client
            .post(self.url("/account/tokens/email"))
            .json(&json!({ "userId": user_id, "email": email }));
        self.send(request).await
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session> {
        let request = self
            .client
            .post(self.url("/account/sessions/token"))
            .json(&json!({ "userId": user_id, "secret": secret }));
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::list_all_documents;
    use crate::config::BackendMode;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> RestBackend {
        let config = BackendConfig {
            mode: BackendMode::Rest,
            endpoint: server.uri(),
            project_id: "proj".to_string(),
            api_key: Some("secret-key".to_string()),
            ..BackendConfig::default()
        };
        RestBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_create_document_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db/collections/users/documents"))
            .and(header("X-Appwrite-Project", "proj"))
            .and(header("X-Appwrite-Key", "secret-key"))
            .and(body_partial_json(json!({"documentId": "u1", "data": {"email": "a@x.com"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "$id": "u1",
                "$createdAt": "2024-05-01T10:00:00.000+00:00",
                "email": "a@x.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let document = backend
            .create_document("db", "users", "u1", json!({"email": "a@x.com"}))
            .await
            .unwrap();

        assert_eq!(document.id, "u1");
        assert_eq!(document.data["email"], "a@x.com");
    }

    #[tokio::test]
    async fn test_list_documents_encodes_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/databases/db/collections/users/documents"))
            .and(query_param(
                "queries[]",
                r#"{"method":"equal","attribute":"email","values":["a@x.com"]}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "documents": [{"$id": "u1", "email": "a@x.com"}]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let list = backend
            .list_documents("db", "users", &[Query::equal("email", ["a@x.com"])])
            .await
            .unwrap();

        assert_eq!(list.total, 1);
        assert_eq!(list.documents[0].id, "u1");
    }

    #[tokio::test]
    async fn test_list_all_documents_reads_every_page() {
        let server = MockServer::start().await;
        let cursor = serde_json::to_string(&Query::cursor_after("f2")).unwrap();
        let limit = serde_json::to_string(&Query::limit(2)).unwrap();

        // Mounted first so it wins once the cursor is present.
        Mock::given(method("GET"))
            .and(path("/databases/db/collections/files/documents"))
            .and(query_param("queries[]", cursor.as_str()))
            .and(query_param("queries[]", limit.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 3,
                "documents": [{"$id": "f3", "owner": "u1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/databases/db/collections/files/documents"))
            .and(query_param("queries[]", limit.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 3,
                "documents": [
                    {"$id": "f1", "owner": "u1"},
                    {"$id": "f2", "owner": "u1"}
                ]
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let all = list_all_documents(
            &backend,
            "db",
            "files",
            &[Query::equal("owner", ["u1"])],
            2,
        )
        .await
        .unwrap();

        let ids: Vec<_> = all.documents.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        assert_eq!(all.total, 3);
    }

    #[tokio::test]
    async fn test_get_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/databases/db/collections/files/documents/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "$id": "f1",
                "name": "report.pdf"
            })))
            .mount(&server)
            .await;

        let document = backend_for(&server)
            .get_document("db", "files", "f1")
            .await
            .unwrap();
        assert_eq!(document.data["name"], "report.pdf");
    }

    #[tokio::test]
    async fn test_error_statuses_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db/collections/users/documents"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "Document with the requested ID already exists.",
                "code": 409,
                "type": "document_already_exists"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storage/buckets/uploads/files/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "The requested file could not be found.",
                "code": 404,
                "type": "storage_file_not_found"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/account/tokens/email"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = backend_for(&server);

        let conflict = backend
            .create_document("db", "users", "u1", json!({}))
            .await
            .unwrap_err();
        assert!(conflict.is_conflict());

        let missing = backend.delete_file("uploads", "missing").await.unwrap_err();
        assert!(missing.is_not_found());

        let failed = backend
            .create_email_token("acc", "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(failed, BackendError::Api { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_create_file_uploads_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/buckets/uploads/files"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "$id": "blob1",
                "name": "report.pdf",
                "sizeOriginal": 5000,
                "mimeType": "application/pdf"
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let blob = backend
            .create_file("uploads", "blob1", "report.pdf", vec![0u8; 5000])
            .await
            .unwrap();

        assert_eq!(blob.id, "blob1");
        assert_eq!(blob.size_original, 5000);
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let config = BackendConfig {
            mode: BackendMode::Rest,
            api_key: None,
            ..BackendConfig::default()
        };
        assert!(matches!(RestBackend::new(&config), Err(AppError::Config(_))));
    }
}

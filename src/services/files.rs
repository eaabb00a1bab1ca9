use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    backend::{list_all_documents, unique_id, BackendClient, DocumentList, Query, LIST_PAGE_SIZE},
    config::{BackendConfig, Config},
    errors::{AppError, Result},
    models::{FileRecord, FileType, NewFile, RenameFile, UploadFile, User},
    services::{handle_error, revalidation::ViewInvalidator, saga::Saga},
    utils::{
        file::{compose_file_name, get_file_type},
        validation::validate_file_name,
    },
};

/// Upload, listing and rename operations over the files collection and bucket.
#[derive(Clone)]
pub struct FileService {
    backend: BackendClient,
    config: BackendConfig,
    max_file_size: usize,
    invalidator: Arc<dyn ViewInvalidator>,
}

impl FileService {
    pub fn new(
        backend: BackendClient,
        config: &Config,
        invalidator: Arc<dyn ViewInvalidator>,
    ) -> Self {
        Self {
            backend,
            config: config.backend.clone(),
            max_file_size: config.max_file_size,
            invalidator,
        }
    }

    /// Stores the blob, then the file document that references it.
    ///
    /// If the document cannot be persisted the blob is deleted again before the
    /// error is returned, so no blob outlives a failed upload.
    pub async fn upload_file(&self, upload: UploadFile, path: &str) -> Result<FileRecord> {
        validate_file_name(&upload.file_name)?;
        if upload.bytes.len() > self.max_file_size {
            return Err(AppError::FileTooLarge);
        }

        let bucket_id = self.config.bucket_id.clone();
        let blob = self
            .backend
            .storage
            .create_file(&bucket_id, &unique_id(), &upload.file_name, upload.bytes)
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Failed to upload file.");
                AppError::UploadFailed(error)
            })?;

        let mut saga = Saga::new("upload_file");
        let storage = self.backend.storage.clone();
        let blob_id = blob.id.clone();
        saga.record("delete_blob", move || async move {
            storage.delete_file(&bucket_id, &blob_id).await
        });

        let (file_type, extension) = get_file_type(&blob.name);
        let new_file = NewFile {
            file_type,
            name: blob.name.clone(),
            url: self.config.file_url(&blob.id),
            extension,
            size: blob.size_original,
            owner_id: upload.owner_id,
            account_id: upload.account_id,
            shared_user_emails: BTreeSet::new(),
            blob_id: blob.id.clone(),
        };

        let data = match serde_json::to_value(&new_file) {
            Ok(data) => data,
            Err(error) => {
                saga.compensate().await;
                return Err(AppError::UploadFailed(error.into()));
            }
        };

        match self
            .backend
            .databases
            .create_document(
                &self.config.database_id,
                &self.config.files_collection_id,
                &unique_id(),
                data,
            )
            .await
        {
            Ok(document) => {
                saga.complete();
                self.invalidator.revalidate_path(path);
                tracing::info!(
                    file_id = %document.id,
                    blob_id = %blob.id,
                    size = blob.size_original,
                    "Uploaded file"
                );
                Ok(new_file.into_record(&document))
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    blob_id = %blob.id,
                    "Failed to create file document."
                );
                saga.compensate().await;
                Err(AppError::UploadFailed(error))
            }
        }
    }

    /// Files owned by or shared with `current_user`, optionally limited to `types`.
    ///
    /// Every page is read, so the result holds all visible files.
    pub async fn get_files(
        &self,
        current_user: &User,
        types: &[FileType],
    ) -> Result<DocumentList<FileRecord>> {
        let mut queries = vec![Query::or(vec![
            Query::equal("owner", [current_user.id.as_str()]),
            Query::contains("users", [current_user.email.as_str()]),
        ])];
        if !types.is_empty() {
            queries.push(Query::equal("type", types.iter().map(FileType::as_str)));
        }

        let files = list_all_documents(
            self.backend.databases.as_ref(),
            &self.config.database_id,
            &self.config.files_collection_id,
            &queries,
            LIST_PAGE_SIZE,
        )
        .await
        .map_err(handle_error("Failed to get files."))?;

        Ok(files.decode()?)
    }

    /// Sets the file's name to `name.extension`; no other attribute changes.
    ///
    /// Only files visible to `current_user` (owned or shared) can be renamed;
    /// anything else is reported as not found.
    pub async fn rename_file(
        &self,
        current_user: &User,
        rename: RenameFile,
    ) -> Result<FileRecord> {
        let new_name = compose_file_name(&rename.name, &rename.extension);
        validate_file_name(&new_name)?;

        let existing: FileRecord = self
            .backend
            .databases
            .get_document(
                &self.config.database_id,
                &self.config.files_collection_id,
                &rename.file_id,
            )
            .await
            .map_err(handle_error("Failed to load file for rename."))?
            .decode()?;

        if !existing.is_visible_to(current_user) {
            tracing::warn!(
                file_id = %rename.file_id,
                user_id = %current_user.id,
                "Rename refused for a file the user cannot see"
            );
            return Err(AppError::NotFound);
        }

        let document = self
            .backend
            .databases
            .update_document(
                &self.config.database_id,
                &self.config.files_collection_id,
                &rename.file_id,
                json!({ "name": new_name }),
            )
            .await
            .map_err(handle_error("Failed to rename file."))?;

        self.invalidator.revalidate_path(&rename.path);

        Ok(document.decode()?)
    }
}

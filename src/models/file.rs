use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::backend::Document;
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Document => "document",
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file document from the files collection.
///
/// `blob_id` always names an existing blob in the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub size: u64,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub account_id: String,
    #[serde(rename = "users", default)]
    pub shared_user_emails: BTreeSet<String>,
    #[serde(rename = "bucketFileId")]
    pub blob_id: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn is_visible_to(&self, user: &User) -> bool {
        self.owner_id == user.id || self.shared_user_emails.contains(&user.email)
    }
}

/// Attributes written when a file document is created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub size: u64,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub account_id: String,
    #[serde(rename = "users")]
    pub shared_user_emails: BTreeSet<String>,
    #[serde(rename = "bucketFileId")]
    pub blob_id: String,
}

impl NewFile {
    pub fn into_record(self, document: &Document) -> FileRecord {
        FileRecord {
            id: document.id.clone(),
            file_type: self.file_type,
            name: self.name,
            url: self.url,
            extension: self.extension,
            size: self.size,
            owner_id: self.owner_id,
            account_id: self.account_id,
            shared_user_emails: self.shared_user_emails,
            blob_id: self.blob_id,
            created_at: document.created_at,
        }
    }
}

/// Input to the upload flow.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub owner_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone)]
pub struct RenameFile {
    pub file_id: String,
    pub name: String,
    pub extension: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub name: String,
    pub extension: String,
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    pub category: Option<String>,
    pub path: Option<String>,
}

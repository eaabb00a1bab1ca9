use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header::HeaderName, StatusCode},
    response::{IntoResponse, Json},
};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::auth::AuthenticatedUser,
    models::{FileRecord, ListFilesQuery, RenameFile, RenameFileRequest, UploadFile},
    utils::file::file_types_for_category,
};

pub const VIEW_VERSION_HEADER: HeaderName = HeaderName::from_static("x-view-version");

pub async fn list_files(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListFilesQuery>,
) -> Result<impl IntoResponse> {
    let category = query.category.as_deref().unwrap_or("");
    let types = file_types_for_category(category);
    let path = query
        .path
        .clone()
        .unwrap_or_else(|| format!("/{}", category));

    let files = state.files.get_files(&user, &types).await?;
    let version = state.revalidations.version(&path);

    Ok(([(VIEW_VERSION_HEADER, version.to_string())], Json(files)))
}

pub async fn upload_file(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>)> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut path: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to parse multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read file data: {}", e))
                })?;
                file_data = Some(data.to_vec());
            }
            "path" => {
                path = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read path: {}", e))
                })?);
            }
            _ => {} // Ignore unknown fields
        }
    }

    let bytes = file_data
        .ok_or_else(|| AppError::Validation("Form field 'file' is missing".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::Validation("File name is required".to_string()))?;
    let path = path.unwrap_or_else(|| "/".to_string());

    let upload = UploadFile {
        bytes,
        file_name,
        owner_id: user.id,
        account_id: user.account_id,
    };
    let file = state.files.upload_file(upload, &path).await?;

    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn rename_file(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(file_id): Path<String>,
    Json(request): Json<RenameFileRequest>,
) -> Result<Json<FileRecord>> {
    let rename = RenameFile {
        file_id,
        name: request.name,
        extension: request.extension,
        path: request.path.unwrap_or_else(|| "/".to_string()),
    };

    let file = state.files.rename_file(&user, rename).await?;

    Ok(Json(file))
}

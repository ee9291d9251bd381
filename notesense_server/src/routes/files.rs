use std::path::Path as FilePath;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, TextExpressionMethods,
};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{
        files::{FileKind, FileMetadata, FileUploadForm, NewFileMetadata},
        state::NoteSenseState,
    },
    routes::notes::{find_owned_note, lock_owned_note, note_not_found},
    schema,
    utils::{self, TransactionError},
};

pub fn router(state: NoteSenseState) -> OpenApiRouter {
    let max_upload_bytes = state.server_config.max_upload_bytes;
    OpenApiRouter::new()
        .routes(routes!(upload_file, list_files))
        .routes(routes!(get_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

fn multipart_error(err: MultipartError) -> (StatusCode, String) {
    (err.status(), err.body_text())
}

/// Remove a stored upload that won't be recorded.
async fn discard_upload(file_path: &FilePath, id: Uuid) {
    if let Err(err) = tokio::fs::remove_file(file_path).await {
        tracing::warn!(file_id = %id, error = %err, "failed to remove upload");
    }
}

/// Upload a file and extract its text.
///
/// When a note ID is given and text could be extracted, the text is
/// appended to the note's content.
#[utoipa::path(
    post,
    path = "",
    request_body(content = FileUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Successfully uploaded file", body = FileMetadata),
        (status = 400, description = "Missing file or unsupported file type"),
        (status = 404, description = "Note not found"),
        (status = 413, description = "File is too large"),
        (status = 502, description = "Text extraction failed")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn upload_file(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileMetadata>), (StatusCode, String)> {
    let user_id = auth.user_id;
    let mut upload: Option<(String, Bytes)> = None;
    let mut note_id: Option<Uuid> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some((file_name, data));
            }
            "note_id" => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                if !value.is_empty() {
                    note_id = Some(Uuid::parse_str(value).map_err(utils::bad_request)?);
                }
            }
            _ => {}
        }
    }
    let (file_name, data) =
        upload.ok_or_else(|| (StatusCode::BAD_REQUEST, "missing file field".to_string()))?;
    let kind = FileKind::from_file_name(&file_name)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "unsupported file type".to_string()))?;

    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    if let Some(note_id) = note_id {
        find_owned_note(&mut conn, user_id, note_id)
            .await
            .map_err(utils::diesel_error)?
            .ok_or_else(note_not_found)?;
    }

    // Files are stored by ID so user-provided names never touch the filesystem.
    let id = Uuid::new_v4();
    let extension = FilePath::new(&file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let user_dir = state.server_config.upload_dir.join(user_id.to_string());
    tokio::fs::create_dir_all(&user_dir)
        .await
        .map_err(utils::internal_error)?;
    let file_path = user_dir.join(format!("{id}.{extension}"));
    tokio::fs::write(&file_path, &data)
        .await
        .map_err(utils::internal_error)?;
    tracing::info!(%user_id, file_id = %id, %kind, bytes = data.len(), "stored upload");

    let extracted_text = match state.extractor.extract(kind, &file_path).await {
        Ok(text) => text,
        Err(err) => {
            discard_upload(&file_path, id).await;
            return Err(err);
        }
    };
    let processed_at = extracted_text.as_ref().map(|_| Utc::now());
    let extracted_text = extracted_text.unwrap_or_default();
    let new_file = NewFileMetadata {
        id,
        user_id,
        note_id,
        file_name,
        file_type: kind.to_string(),
        file_path: file_path.to_string_lossy().into_owned(),
        extracted_text,
        processed_at,
    };

    let result = conn
        .transaction::<_, TransactionError, _>(move |conn| {
            async move {
                // The note may have been deleted while text was extracted.
                if let Some(note_id) = new_file.note_id {
                    lock_owned_note(conn, user_id, note_id).await?;
                }
                let file: FileMetadata = diesel::insert_into(schema::files::table)
                    .values(new_file)
                    .returning(FileMetadata::as_returning())
                    .get_result(conn)
                    .await?;
                if let Some(note_id) = file.note_id.filter(|_| !file.extracted_text.is_empty()) {
                    let appended = format!("\n\n{}", file.extracted_text);
                    diesel::update(schema::notes::table.find(note_id))
                        .set((
                            schema::notes::content.eq(schema::notes::content.concat(appended)),
                            schema::notes::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                }
                Ok(file)
            }
            .scope_boxed()
        })
        .await;
    match result {
        Ok(file) => Ok((StatusCode::CREATED, Json(file))),
        Err(err) => {
            discard_upload(&file_path, id).await;
            Err(err.into())
        }
    }
}

/// List the user's uploaded files, newest first.
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = 200, description = "Successfully listed files", body = [FileMetadata])
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_files(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
) -> Result<Json<Vec<FileMetadata>>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let files = schema::files::table
        .select(FileMetadata::as_select())
        .filter(schema::files::user_id.eq(auth.user_id))
        .order(schema::files::created_at.desc())
        .load(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    Ok(Json(files))
}

/// Get an uploaded file's metadata and extracted text.
#[utoipa::path(
    get,
    path = "/{id}",
    params(
        ("id" = Uuid, Path, description = "ID of the file to get"),
    ),
    responses(
        (status = 200, description = "Successfully got file", body = FileMetadata),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_file(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FileMetadata>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let file = schema::files::table
        .select(FileMetadata::as_select())
        .filter(schema::files::id.eq(id))
        .filter(schema::files::user_id.eq(auth.user_id))
        .first(&mut conn)
        .await
        .optional()
        .map_err(utils::diesel_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "file not found".to_string()))?;
    Ok(Json(file))
}

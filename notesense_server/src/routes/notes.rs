use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgArrayExpressionMethods,
    PgTextExpressionMethods, QueryDsl, SelectableHelper,
};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{
        notes::{
            NewNoteRequest, Note, NoteChangeset, NoteResponse, NoteSearchParams, NotesResponse,
            UpdateNoteRequest,
        },
        state::NoteSenseState,
    },
    schema,
    utils::{self, TransactionError},
};

pub const NOTE_NOT_FOUND: &str = "note not found";

pub fn router(state: NoteSenseState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(add_note, list_notes))
        .routes(routes!(search_notes))
        .routes(routes!(get_note, update_note, delete_note))
        .with_state(state)
}

pub fn note_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, NOTE_NOT_FOUND.to_string())
}

/// Fetch a note, but only if it belongs to the user.
pub async fn find_owned_note(
    conn: &mut utils::Conn<'_>,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Note>, diesel::result::Error> {
    schema::notes::table
        .select(Note::as_select())
        .filter(schema::notes::id.eq(id))
        .filter(schema::notes::user_id.eq(user_id))
        .first(conn)
        .await
        .optional()
}

/// Lock a note the user owns until the end of the transaction.
pub async fn lock_owned_note(
    conn: &mut utils::Conn<'_>,
    user_id: Uuid,
    id: Uuid,
) -> Result<Note, TransactionError> {
    schema::notes::table
        .select(Note::as_select())
        .filter(schema::notes::id.eq(id))
        .filter(schema::notes::user_id.eq(user_id))
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| TransactionError::NotFound(NOTE_NOT_FOUND.to_string()))
}

/// Apply a partial update to a note the user owns and return the result.
pub async fn update_owned_note(
    conn: &mut utils::Conn<'_>,
    user_id: Uuid,
    id: Uuid,
    changeset: NoteChangeset,
) -> Result<Note, (StatusCode, String)> {
    diesel::update(
        schema::notes::table
            .filter(schema::notes::id.eq(id))
            .filter(schema::notes::user_id.eq(user_id)),
    )
    .set(changeset)
    .returning(Note::as_returning())
    .get_result(conn)
    .await
    .optional()
    .map_err(utils::diesel_error)?
    .ok_or_else(note_not_found)
}

/// Add and return a note.
#[utoipa::path(
    post,
    path = "",
    request_body = NewNoteRequest,
    responses(
        (status = 201, description = "Successfully added a note", body = NoteResponse),
        (status = 400, description = "Missing title or invalid priority")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn add_note(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Json(body): Json<NewNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), (StatusCode, String)> {
    let new_note = body
        .into_new_note(auth.user_id)
        .map_err(utils::note_error)?;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = diesel::insert_into(schema::notes::table)
        .values(new_note)
        .returning(Note::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    Ok((StatusCode::CREATED, Json(NoteResponse { note })))
}

/// List all of the user's notes, newest first.
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = 200, description = "Successfully listed notes", body = NotesResponse)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_notes(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
) -> Result<Json<NotesResponse>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let notes = schema::notes::table
        .select(Note::as_select())
        .filter(schema::notes::user_id.eq(auth.user_id))
        .order(schema::notes::created_at.desc())
        .load(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    Ok(Json(NotesResponse { notes }))
}

/// Search the user's notes by text and categories.
///
/// The query is matched case-insensitively against titles and content. When
/// categories are given, only notes in at least one of them are returned.
#[utoipa::path(
    post,
    path = "/search",
    request_body = NoteSearchParams,
    responses(
        (status = 200, description = "Successfully searched notes", body = NotesResponse)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn search_notes(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Json(params): Json<NoteSearchParams>,
) -> Result<Json<NotesResponse>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let mut query = schema::notes::table
        .select(Note::as_select())
        .filter(schema::notes::user_id.eq(auth.user_id))
        .into_boxed();

    // Match text in either the title or the content.
    let text = params.query.trim();
    if !text.is_empty() {
        let pattern = utils::like_pattern(text);
        query = query.filter(
            schema::notes::title
                .ilike(pattern.clone())
                .or(schema::notes::content.ilike(pattern)),
        );
    }

    // Match any of the categories.
    if !params.categories.is_empty() {
        query = query.filter(schema::notes::categories.overlaps_with(params.categories));
    }

    let notes = query
        .order(schema::notes::created_at.desc())
        .load(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    Ok(Json(NotesResponse { notes }))
}

/// Get a note.
#[utoipa::path(
    get,
    path = "/{id}",
    params(
        ("id" = Uuid, Path, description = "ID of the note to get"),
    ),
    responses(
        (status = 200, description = "Successfully got note", body = NoteResponse),
        (status = 404, description = "Note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_note(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NoteResponse>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = find_owned_note(&mut conn, auth.user_id, id)
        .await
        .map_err(utils::diesel_error)?
        .ok_or_else(note_not_found)?;
    Ok(Json(NoteResponse { note }))
}

/// Update a note. Only fields that are present and non-empty are changed.
#[utoipa::path(
    patch,
    path = "/{id}",
    params(
        ("id" = Uuid, Path, description = "ID of the note to update"),
    ),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Successfully updated note", body = NoteResponse),
        (status = 400, description = "Invalid priority"),
        (status = 404, description = "Note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_note(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNoteRequest>,
) -> Result<Json<NoteResponse>, (StatusCode, String)> {
    let changeset = body.into_changeset().map_err(utils::note_error)?;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = update_owned_note(&mut conn, auth.user_id, id, changeset).await?;
    Ok(Json(NoteResponse { note }))
}

/// Delete a note and drop it from the connections of the user's other notes.
#[utoipa::path(
    delete,
    path = "/{id}",
    params(
        ("id" = Uuid, Path, description = "ID of the note to delete"),
    ),
    responses(
        (status = 204, description = "Successfully deleted note"),
        (status = 404, description = "Note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_note(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user_id = auth.user_id;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    conn.transaction::<_, TransactionError, _>(move |conn| {
        async move {
            let deleted = diesel::delete(
                schema::notes::table
                    .filter(schema::notes::id.eq(id))
                    .filter(schema::notes::user_id.eq(user_id)),
            )
            .execute(conn)
            .await?;
            if deleted == 0 {
                return Err(TransactionError::NotFound(NOTE_NOT_FOUND.to_string()));
            }

            // Other notes that still point at the deleted one.
            let linked_notes: Vec<Note> = schema::notes::table
                .select(Note::as_select())
                .filter(schema::notes::user_id.eq(user_id))
                .filter(schema::notes::connected_note_ids.contains(vec![id]))
                .for_update()
                .load(conn)
                .await?;
            for mut note in linked_notes {
                note.remove_connection(id)?;
                diesel::update(schema::notes::table.find(note.id))
                    .set(note.connection_changeset())
                    .execute(conn)
                    .await?;
            }
            Ok(())
        }
        .scope_boxed()
    })
    .await?;
    tracing::debug!(note_id = %id, "deleted note");
    Ok(StatusCode::NO_CONTENT)
}

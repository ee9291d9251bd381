use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{
        notes::{KanbanBoard, KanbanUpdateRequest, Note, NoteResponse, UpdateNoteRequest},
        state::NoteSenseState,
    },
    routes::notes::update_owned_note,
    schema, utils,
};

pub fn router(state: NoteSenseState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_board))
        .routes(routes!(move_note))
        .with_state(state)
}

/// Get the user's notes grouped into Kanban columns.
///
/// Notes within a column are ordered by priority and then by creation time.
/// Notes with a status that isn't a column are returned as uncategorized.
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = 200, description = "Successfully got the board", body = KanbanBoard)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_board(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
) -> Result<Json<KanbanBoard>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let notes = schema::notes::table
        .select(Note::as_select())
        .filter(schema::notes::user_id.eq(auth.user_id))
        .order((schema::notes::priority, schema::notes::created_at))
        .load(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    Ok(Json(KanbanBoard::from_notes(notes)))
}

/// Move a note to another column and/or change its priority.
#[utoipa::path(
    patch,
    path = "/note/{id}",
    params(
        ("id" = Uuid, Path, description = "ID of the note to move"),
    ),
    request_body = KanbanUpdateRequest,
    responses(
        (status = 200, description = "Successfully moved note", body = NoteResponse),
        (status = 400, description = "Invalid priority"),
        (status = 404, description = "Note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn move_note(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<KanbanUpdateRequest>,
) -> Result<Json<NoteResponse>, (StatusCode, String)> {
    let changeset = UpdateNoteRequest::from(body)
        .into_changeset()
        .map_err(utils::note_error)?;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = update_owned_note(&mut conn, auth.user_id, id, changeset).await?;
    Ok(Json(NoteResponse { note }))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{
        notes::{NewConnectionRequest, NoteConnections},
        state::NoteSenseState,
    },
    routes::notes::{find_owned_note, lock_owned_note, note_not_found},
    schema,
    utils::{self, TransactionError},
};

pub fn router(state: NoteSenseState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_connections, add_connection))
        .routes(routes!(remove_connection))
        .with_state(state)
}

/// Get the notes a note is connected to.
#[utoipa::path(
    get,
    path = "/{id}/connections",
    params(
        ("id" = Uuid, Path, description = "ID of the note to get connections for"),
    ),
    responses(
        (status = 200, description = "Successfully got connections", body = NoteConnections),
        (status = 404, description = "Note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_connections(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NoteConnections>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = find_owned_note(&mut conn, auth.user_id, id)
        .await
        .map_err(utils::diesel_error)?
        .ok_or_else(note_not_found)?;
    Ok(Json(NoteConnections::from(&note)))
}

/// Connect a note to another one of the user's notes.
///
/// A note can't be connected to itself or to the same note twice, and can
/// have at most 10 connections.
#[utoipa::path(
    post,
    path = "/{id}/connections",
    params(
        ("id" = Uuid, Path, description = "ID of the note to connect from"),
    ),
    request_body = NewConnectionRequest,
    responses(
        (status = 201, description = "Successfully added connection", body = NoteConnections),
        (status = 400, description = "Self connection, duplicate connection, or too many connections"),
        (status = 404, description = "Note or connected note not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn add_connection(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<NewConnectionRequest>,
) -> Result<(StatusCode, Json<NoteConnections>), (StatusCode, String)> {
    let user_id = auth.user_id;
    let NewConnectionRequest {
        connected_note_id,
        connection_type,
    } = body;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = conn
        .transaction::<_, TransactionError, _>(move |conn| {
            async move {
                let mut note = lock_owned_note(conn, user_id, id).await?;
                // Held until commit so the target can't be deleted underneath us.
                schema::notes::table
                    .select(schema::notes::id)
                    .filter(schema::notes::id.eq(connected_note_id))
                    .filter(schema::notes::user_id.eq(user_id))
                    .for_key_share()
                    .first::<Uuid>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| {
                        TransactionError::NotFound("connected note not found".to_string())
                    })?;
                note.add_connection(connected_note_id, connection_type)?;
                diesel::update(schema::notes::table.find(note.id))
                    .set(note.connection_changeset())
                    .execute(conn)
                    .await?;
                Ok(note)
            }
            .scope_boxed()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(NoteConnections::from(&note))))
}

/// Remove a connection from a note.
#[utoipa::path(
    delete,
    path = "/{id}/connections/{connected_note_id}",
    params(
        ("id" = Uuid, Path, description = "ID of the note to remove the connection from"),
        ("connected_note_id" = Uuid, Path, description = "ID of the connected note"),
    ),
    responses(
        (status = 200, description = "Successfully removed connection", body = NoteConnections),
        (status = 404, description = "Note or connection not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn remove_connection(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
    Path((id, connected_note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<NoteConnections>, (StatusCode, String)> {
    let user_id = auth.user_id;
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let note = conn
        .transaction::<_, TransactionError, _>(move |conn| {
            async move {
                let mut note = lock_owned_note(conn, user_id, id).await?;
                note.remove_connection(connected_note_id)?;
                diesel::update(schema::notes::table.find(note.id))
                    .set(note.connection_changeset())
                    .execute(conn)
                    .await?;
                Ok(note)
            }
            .scope_boxed()
        })
        .await?;
    Ok(Json(NoteConnections::from(&note)))
}

use std::fmt;

use bon::Builder;
use chrono::{DateTime, Utc};
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Max number of outgoing connections a single note can have.
pub const MAX_CONNECTIONS: usize = 10;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum NoteError {
    #[error("title is required")]
    MissingTitle,
    #[error("priority must be between 0 and 3, got {0}")]
    InvalidPriority(i32),
    #[error("a note cannot be connected to itself")]
    SelfConnection,
    #[error("notes are already connected")]
    AlreadyConnected,
    #[error("a note can have at most {} connections", MAX_CONNECTIONS)]
    TooManyConnections,
    #[error("connection not found")]
    ConnectionNotFound,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    #[default]
    Backlog,
    Todo,
    #[serde(alias = "inprogress", alias = "in progress")]
    InProgress,
    #[serde(alias = "completed")]
    Done,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Backlog => "backlog",
            NoteStatus::Todo => "todo",
            NoteStatus::InProgress => "in_progress",
            NoteStatus::Done => "done",
        }
    }

    /// Leniently parse a stored status. Returns `None` for values that
    /// don't belong to any Kanban column.
    pub fn from_column(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "backlog" => Some(NoteStatus::Backlog),
            "todo" => Some(NoteStatus::Todo),
            "in_progress" | "inprogress" | "in progress" => Some(NoteStatus::InProgress),
            "done" | "completed" => Some(NoteStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn validate_priority(priority: Option<i32>) -> Result<Option<i32>, NoteError> {
    match priority {
        Some(priority) if !(0..=3).contains(&priority) => Err(NoteError::InvalidPriority(priority)),
        priority => Ok(priority),
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Note {
    /// Unique note ID.
    pub id: Uuid,
    /// ID of the user that owns the note.
    pub user_id: Uuid,
    /// Note title.
    pub title: String,
    /// Note content.
    pub content: String,
    /// Emoji shown next to the note.
    pub emoji: String,
    /// Categories the note belongs to.
    pub categories: Vec<String>,
    /// Kanban status of the note.
    pub status: String,
    /// Priority from 0 (lowest) to 3 (highest).
    pub priority: i32,
    /// IDs of notes this note is connected to.
    pub connected_note_ids: Vec<Uuid>,
    /// Connection types, index-aligned with `connected_note_ids`.
    pub connection_types: Vec<String>,
    /// Datetime the note was created in ISO format.
    pub created_at: DateTime<Utc>,
    /// Datetime the note was last updated in ISO format.
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn connections(&self) -> Vec<Connection> {
        self.connected_note_ids
            .iter()
            .zip(&self.connection_types)
            .map(|(note_id, connection_type)| Connection {
                note_id: *note_id,
                connection_type: connection_type.clone(),
            })
            .collect()
    }

    pub fn add_connection(
        &mut self,
        connected_note_id: Uuid,
        connection_type: String,
    ) -> Result<(), NoteError> {
        if connected_note_id == self.id {
            return Err(NoteError::SelfConnection);
        }
        if self.connected_note_ids.contains(&connected_note_id) {
            return Err(NoteError::AlreadyConnected);
        }
        if self.connected_note_ids.len() >= MAX_CONNECTIONS {
            return Err(NoteError::TooManyConnections);
        }
        self.connected_note_ids.push(connected_note_id);
        self.connection_types.push(connection_type);
        Ok(())
    }

    pub fn remove_connection(&mut self, connected_note_id: Uuid) -> Result<Connection, NoteError> {
        let index = self
            .connected_note_ids
            .iter()
            .position(|id| *id == connected_note_id)
            .ok_or(NoteError::ConnectionNotFound)?;
        let note_id = self.connected_note_ids.remove(index);
        let connection_type = self.connection_types.remove(index);
        Ok(Connection {
            note_id,
            connection_type,
        })
    }

    pub fn connection_changeset(&self) -> ConnectionChangeset {
        ConnectionChangeset {
            connected_note_ids: self.connected_note_ids.clone(),
            connection_types: self.connection_types.clone(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewNote {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub emoji: String,
    pub categories: Vec<String>,
    pub status: String,
    pub priority: i32,
}

#[derive(AsChangeset, Debug, PartialEq)]
#[diesel(table_name = crate::schema::notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NoteChangeset {
    pub title: Option<String>,
    pub content: Option<String>,
    pub emoji: Option<String>,
    pub categories: Option<Vec<String>>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConnectionChangeset {
    pub connected_note_ids: Vec<Uuid>,
    pub connection_types: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Builder, Deserialize, Serialize, ToSchema)]
pub struct NewNoteRequest {
    /// Note title.
    pub title: String,
    /// Note content.
    #[serde(default)]
    #[builder(default)]
    pub content: String,
    /// Emoji shown next to the note.
    #[serde(default)]
    #[builder(default)]
    pub emoji: String,
    /// Categories the note belongs to.
    #[serde(default)]
    #[builder(default)]
    pub categories: Vec<String>,
    /// Initial Kanban status. Defaults to backlog.
    pub status: Option<NoteStatus>,
    /// Initial priority from 0 to 3. Defaults to 0.
    pub priority: Option<i32>,
}

impl NewNoteRequest {
    pub fn into_new_note(self, user_id: Uuid) -> Result<NewNote, NoteError> {
        let NewNoteRequest {
            title,
            content,
            emoji,
            categories,
            status,
            priority,
        } = self;
        if title.trim().is_empty() {
            return Err(NoteError::MissingTitle);
        }
        let priority = validate_priority(priority)?.unwrap_or_default();
        Ok(NewNote {
            user_id,
            title,
            content,
            emoji,
            categories,
            status: status.unwrap_or_default().to_string(),
            priority,
        })
    }
}

#[derive(Builder, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateNoteRequest {
    /// New title. Ignored when empty.
    pub title: Option<String>,
    /// New content. Ignored when empty.
    pub content: Option<String>,
    /// New emoji. Ignored when empty.
    pub emoji: Option<String>,
    /// New categories. Ignored when empty.
    pub categories: Option<Vec<String>>,
    /// New Kanban status.
    pub status: Option<NoteStatus>,
    /// New priority from 0 to 3.
    pub priority: Option<i32>,
}

impl UpdateNoteRequest {
    pub fn into_changeset(self) -> Result<NoteChangeset, NoteError> {
        let UpdateNoteRequest {
            title,
            content,
            emoji,
            categories,
            status,
            priority,
        } = self;
        Ok(NoteChangeset {
            title: title.filter(|title| !title.trim().is_empty()),
            content: content.filter(|content| !content.is_empty()),
            emoji: emoji.filter(|emoji| !emoji.is_empty()),
            categories: categories.filter(|categories| !categories.is_empty()),
            status: status.map(|status| status.to_string()),
            priority: validate_priority(priority)?,
            updated_at: Utc::now(),
        })
    }
}

#[derive(Builder, Default, Deserialize, Serialize, ToSchema)]
pub struct KanbanUpdateRequest {
    /// Column to move the note to.
    pub status: Option<NoteStatus>,
    /// New priority from 0 to 3.
    pub priority: Option<i32>,
}

impl From<KanbanUpdateRequest> for UpdateNoteRequest {
    fn from(request: KanbanUpdateRequest) -> Self {
        UpdateNoteRequest {
            status: request.status,
            priority: request.priority,
            ..Default::default()
        }
    }
}

#[derive(Builder, Deserialize, Serialize, ToSchema)]
pub struct NoteSearchParams {
    /// Case-insensitive text to look for in note titles and content.
    #[serde(default, alias = "q")]
    #[builder(default)]
    pub query: String,
    /// Only return notes in at least one of these categories.
    #[serde(default)]
    #[builder(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct NoteResponse {
    pub note: Note,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct NotesResponse {
    pub notes: Vec<Note>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Serialize, ToSchema)]
pub struct KanbanBoard {
    pub backlog: Vec<Note>,
    pub todo: Vec<Note>,
    pub in_progress: Vec<Note>,
    pub done: Vec<Note>,
    /// Notes whose status doesn't match any column.
    pub uncategorized: Vec<Note>,
}

impl KanbanBoard {
    /// Bucket notes into columns, keeping their relative order.
    pub fn from_notes(notes: Vec<Note>) -> Self {
        let mut board = KanbanBoard::default();
        for note in notes {
            let column = match NoteStatus::from_column(&note.status) {
                Some(NoteStatus::Backlog) => &mut board.backlog,
                Some(NoteStatus::Todo) => &mut board.todo,
                Some(NoteStatus::InProgress) => &mut board.in_progress,
                Some(NoteStatus::Done) => &mut board.done,
                None => &mut board.uncategorized,
            };
            column.push(note);
        }
        board
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, ToSchema)]
pub struct Connection {
    /// ID of the connected note.
    pub note_id: Uuid,
    /// Free-form kind of connection (e.g., "related", "blocks").
    pub connection_type: String,
}

#[derive(Debug, Deserialize, PartialEq, Serialize, ToSchema)]
pub struct NoteConnections {
    /// ID of the note the connections start from.
    pub note_id: Uuid,
    pub connections: Vec<Connection>,
}

impl From<&Note> for NoteConnections {
    fn from(note: &Note) -> Self {
        NoteConnections {
            note_id: note.id,
            connections: note.connections(),
        }
    }
}

fn default_connection_type() -> String {
    "related".to_string()
}

#[derive(Builder, Deserialize, Serialize, ToSchema)]
pub struct NewConnectionRequest {
    /// ID of the note to connect to.
    pub connected_note_id: Uuid,
    /// Kind of connection. Defaults to "related".
    #[serde(default = "default_connection_type")]
    #[builder(default = default_connection_type())]
    pub connection_type: String,
}

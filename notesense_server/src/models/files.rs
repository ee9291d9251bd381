use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Audio,
    Document,
    Video,
}

impl FileKind {
    /// Classify a file by its (case-insensitive) extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => Some(FileKind::Image),
            "pdf" | "doc" | "docx" | "txt" => Some(FileKind::Document),
            "mp3" | "wav" | "ogg" => Some(FileKind::Audio),
            "mp4" | "avi" | "mov" | "wmv" | "mkv" => Some(FileKind::Video),
            _ => None,
        }
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(FileKind::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Audio => "audio",
            FileKind::Document => "document",
            FileKind::Video => "video",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FileMetadata {
    /// Unique file ID.
    pub id: Uuid,
    /// ID of the user that uploaded the file.
    pub user_id: Uuid,
    /// Note the extracted text was appended to, if any.
    pub note_id: Option<Uuid>,
    /// Original file name as uploaded.
    pub file_name: String,
    /// One of image, audio, document, or video.
    pub file_type: String,
    /// Where the file is stored on the server.
    pub file_path: String,
    /// Text extracted from the file. Empty when nothing was extracted.
    pub extracted_text: String,
    /// Datetime text extraction finished in ISO format.
    pub processed_at: Option<DateTime<Utc>>,
    /// Datetime the file was uploaded in ISO format.
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewFileMetadata {
    pub id: Uuid,
    pub user_id: Uuid,
    pub note_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    pub extracted_text: String,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Multipart form accepted by the upload endpoint. Only used for docs.
#[derive(ToSchema)]
pub struct FileUploadForm {
    /// File contents.
    #[schema(format = Binary)]
    pub file: String,
    /// Optional note to append extracted text to.
    pub note_id: Option<Uuid>,
}

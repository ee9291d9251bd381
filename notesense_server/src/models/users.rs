use bon::Builder;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    /// Unique user ID.
    pub id: Uuid,
    /// Email the user signs in with.
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Datetime the user signed up in ISO format.
    pub created_at: DateTime<Utc>,
    /// Datetime the user was last updated in ISO format.
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

#[derive(Builder, Deserialize, Serialize, ToSchema)]
pub struct SignUpRequest {
    /// Email to sign in with.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Optional display name.
    pub name: Option<String>,
}

#[derive(Builder, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    /// Email used at signup.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token to send in the `Authorization` header.
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Emails are matched case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

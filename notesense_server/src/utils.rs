use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::{HeaderValue, Method, StatusCode, header};
use diesel::{Connection, ConnectionError, PgConnection};
use diesel_async::{AsyncPgConnection, pooled_connection::AsyncDieselConnectionManager};
use serde::{Deserialize, Deserializer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::models::{config::ServerConfig, notes::NoteError};

pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Conn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn default_server_binding_addr() -> String {
    "0.0.0.0:8080".to_string()
}

pub fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

pub fn default_max_upload_bytes() -> usize {
    10 << 20
}

pub fn default_access_token_expiry_mins() -> i64 {
    60 * 24
}

pub fn default_min_password_length() -> usize {
    8
}

pub fn default_max_connect_retries() -> u32 {
    5
}

pub fn default_blacklist_cleanup_interval_secs() -> u64 {
    3600
}

/// Deserialize a string, replacing `${VAR}` references with values from the
/// environment (including `.env`). Unresolved references are an error.
pub fn deserialize_with_envsubst<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value = String::deserialize(deserializer)?;
    // envsubst refuses to run if any variable contains template characters.
    let variables: HashMap<String, String> = dotenvy::vars()
        .filter(|(key, value)| !key.contains(['$', '{', '}']) && !value.contains(['$', '{', '}']))
        .collect();
    let value = envsubst::substitute(value, &variables).map_err(serde::de::Error::custom)?;
    if envsubst::is_templated(&value) {
        return Err(serde::de::Error::custom(format!(
            "unresolved variable in '{value}'"
        )));
    }
    Ok(T::from(value))
}

/// Database URL from `DATABASE_URL` or, when it isn't set, from the
/// individual `DB_*` variables.
pub fn database_url() -> Result<String, dotenvy::Error> {
    if let Ok(url) = dotenvy::var("DATABASE_URL") {
        return Ok(url);
    }
    let host = dotenvy::var("DB_HOST")?;
    let port = dotenvy::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = dotenvy::var("DB_USER")?;
    let password = dotenvy::var("DB_PASSWORD")?;
    let name = dotenvy::var("DB_NAME")?;
    Ok(compose_database_url(&host, &port, &user, &password, &name))
}

/// Postgres URL with the credentials and database name percent-encoded.
pub fn compose_database_url(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    name: &str,
) -> String {
    format!(
        "postgres://{}:{}@{host}:{port}/{}",
        urlencoding::encode(user),
        urlencoding::encode(password),
        urlencoding::encode(name)
    )
}

const MAX_CONNECT_BACKOFF_SECS: u64 = 60;

/// Delay before retrying after the given failed attempt, doubling from 1s up
/// to a one minute cap.
fn connect_backoff(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs.min(MAX_CONNECT_BACKOFF_SECS))
}

/// Connect to the database, backing off exponentially between failed
/// attempts.
pub async fn establish_with_retry(
    db_connection_url: &str,
    max_retries: u32,
) -> Result<PgConnection, ConnectionError> {
    let mut attempt = 0;
    loop {
        match PgConnection::establish(db_connection_url) {
            Ok(conn) => {
                tracing::info!(attempt = attempt + 1, "database connection established");
                return Ok(conn);
            }
            Err(err) if attempt + 1 < max_retries => {
                let backoff = connect_backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "database connection failed"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// CORS layer allowing any origin unless specific origins are configured.
pub fn cors_layer(config: &ServerConfig) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let allow_origin = if config.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Escape LIKE wildcards and wrap the query for a substring match.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error("{0}")]
    NotFound(String),
}

impl From<TransactionError> for (StatusCode, String) {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Diesel(err) => diesel_error(err),
            TransactionError::Note(err) => note_error(err),
            TransactionError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        }
    }
}

/// Map any error into a `400 Bad Request` response.
pub fn bad_request<E>(err: E) -> (StatusCode, String)
where
    E: std::error::Error,
{
    (StatusCode::BAD_REQUEST, err.to_string())
}

/// Map Diesel errors into a specific response.
pub fn diesel_error(err: diesel::result::Error) -> (StatusCode, String) {
    match err {
        diesel::result::Error::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        _ => internal_error(err),
    }
}

/// Map any error into a `500 Internal Server Error` response.
pub fn internal_error<E>(err: E) -> (StatusCode, String)
where
    E: std::error::Error,
{
    tracing::error!(error = %err, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Map note rule violations into a response.
pub fn note_error(err: NoteError) -> (StatusCode, String) {
    match err {
        NoteError::ConnectionNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        _ => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Secret {
        #[serde(deserialize_with = "deserialize_with_envsubst")]
        value: String,
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("oil"), "%oil%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn envsubst_passes_plain_values_through() {
        let secret: Secret = serde_json::from_str(r#"{"value": "plain-secret"}"#).unwrap();
        assert_eq!(secret.value, "plain-secret");
    }

    #[test]
    fn envsubst_rejects_unresolved_variables() {
        let result = serde_json::from_str::<Secret>(
            r#"{"value": "${NOTESENSE_VARIABLE_THAT_IS_NEVER_SET}"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn note_errors_map_to_status_codes() {
        assert_eq!(
            note_error(NoteError::ConnectionNotFound).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(note_error(NoteError::SelfConnection).0, StatusCode::BAD_REQUEST);
        let (status, msg): (StatusCode, String) =
            TransactionError::NotFound("note not found".to_string()).into();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "note not found");
    }

    #[test]
    fn database_url_encodes_credentials() {
        assert_eq!(
            compose_database_url("db", "5432", "note user", "p@ss/w:rd", "notes"),
            "postgres://note%20user:p%40ss%2Fw%3Ard@db:5432/notes"
        );
    }

    #[test]
    fn connect_backoff_doubles_up_to_cap() {
        assert_eq!(connect_backoff(0), Duration::from_secs(1));
        assert_eq!(connect_backoff(3), Duration::from_secs(8));
        assert_eq!(connect_backoff(6), Duration::from_secs(60));
        assert_eq!(connect_backoff(100), Duration::from_secs(60));
    }
}

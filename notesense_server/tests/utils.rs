#![allow(dead_code)]

use std::path::PathBuf;

use diesel::{Connection, PgConnection};
use diesel_migrations::MigrationHarness;
use reqwest::{Client, Response};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use notesense_server::models::{
    config::NoteSenseConfig,
    notes::{NewNoteRequest, Note, NoteResponse},
    users::{AuthResponse, SignUpRequest},
};

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub upload_dir: PathBuf,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }
}

pub async fn assert_ok_response(response: Response) -> Result<Response, String> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.map_err(|err| format!("{err:?}"))?;
        Err(format!("{status}: {body}"))
    }
}

pub fn reset_database(db_connection_url: &str) -> Result<(), String> {
    assert!(db_connection_url.ends_with("/test"));
    let mut conn = PgConnection::establish(db_connection_url).map_err(|err| err.to_string())?;
    conn.revert_all_migrations(notesense_server::MIGRATIONS)
        .map_err(|err| err.to_string())?;
    conn.run_pending_migrations(notesense_server::MIGRATIONS)
        .map_err(|err| err.to_string())?;
    Ok(())
}

/// Reset the test database and serve the API on a random local port.
pub async fn spawn_app() -> Result<TestApp, Box<dyn std::error::Error>> {
    spawn_app_with_extractors(json!({})).await
}

/// Like [`spawn_app`], with text extraction commands keyed by file kind.
pub async fn spawn_app_with_extractors(
    extractors: serde_json::Value,
) -> Result<TestApp, Box<dyn std::error::Error>> {
    // Make sure there's a database URL and it points to a test database so
    // prod isn't goofed during testing.
    let db_connection_url = dotenvy::var("DATABASE_URL")?;
    reset_database(&db_connection_url)?;

    let upload_dir = std::env::temp_dir().join(format!("notesense-test-{}", Uuid::new_v4()));
    let config: NoteSenseConfig = serde_json::from_value(json!({
        "server": {"bind_addr": "127.0.0.1:0", "upload_dir": upload_dir},
        "auth": {"jwt_secret": "integration-test-secret"},
        "database": {"max_connect_retries": 1},
        "extractors": extractors
    }))?;
    let state = notesense_server::init(db_connection_url, config).await?;
    let (router, _) = notesense_server::router(state).split_for_parts();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = format!("http://{}", listener.local_addr()?);
    let _ = tokio::spawn(async move { axum::serve(listener, router).await });
    Ok(TestApp {
        address,
        client: Client::new(),
        upload_dir,
    })
}

/// Sign up a user and return their access token.
pub async fn signup(app: &TestApp, email: &str) -> Result<String, Box<dyn std::error::Error>> {
    let body = SignUpRequest::builder()
        .email(email.to_string())
        .password(PASSWORD.to_string())
        .name("Test User".to_string())
        .build();
    let response = app.client.post(app.url("/signup")).json(&body).send().await?;
    let response = assert_ok_response(response).await?;
    let auth = response.json::<AuthResponse>().await?;
    Ok(auth.token)
}

pub async fn add_note(
    app: &TestApp,
    token: &str,
    body: &NewNoteRequest,
) -> Result<Note, Box<dyn std::error::Error>> {
    let response = app
        .client
        .post(app.url("/api/notes"))
        .bearer_auth(token)
        .json(body)
        .send()
        .await?;
    let response = assert_ok_response(response).await?;
    Ok(response.json::<NoteResponse>().await?.note)
}

pub async fn add_titled_note(
    app: &TestApp,
    token: &str,
    title: &str,
) -> Result<Note, Box<dyn std::error::Error>> {
    let body = NewNoteRequest::builder().title(title.to_string()).build();
    add_note(app, token, &body).await
}

use diesel_async::{AsyncPgConnection, pooled_connection::AsyncDieselConnectionManager};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use utoipa_axum::router::OpenApiRouter;

pub mod auth;
pub mod cleanup;
pub mod extractor;
pub mod models;
pub mod routes;
pub mod schema;
pub mod utils;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Connect to the database, run migrations, and build the shared server state.
pub async fn init(
    db_connection_url: String,
    config: models::config::NoteSenseConfig,
) -> Result<models::state::NoteSenseState, Box<dyn std::error::Error>> {
    let models::config::NoteSenseConfig {
        server: server_config,
        auth: auth_config,
        database: database_config,
        extractors,
    } = config;

    // Get a connection and manually run migrations at startup to ensure the
    // database is ready to go. The database may still be starting up, so
    // retry for a bit first.
    let mut conn =
        utils::establish_with_retry(&db_connection_url, database_config.max_connect_retries)
            .await?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| err.to_string())?;

    tokio::fs::create_dir_all(&server_config.upload_dir).await?;

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_connection_url);
    let pool = bb8::Pool::builder().build(manager).await?;
    let state = models::state::NoteSenseState {
        server_config,
        auth_config,
        database_config,
        extractor: extractor::Extractor::new(extractors),
        pool,
    };
    Ok(state)
}

/// All API routes with their OpenAPI docs.
pub fn router(state: models::state::NoteSenseState) -> OpenApiRouter {
    let notes_router = routes::notes::router(state.clone())
        .merge(routes::connections::router(state.clone()))
        .nest("/kanban", routes::kanban::router(state.clone()));
    OpenApiRouter::new()
        .merge(routes::users::router(state.clone()))
        .nest("/api/notes", notes_router)
        .nest("/api/files", routes::files::router(state))
}

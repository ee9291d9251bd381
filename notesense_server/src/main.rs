use std::time::Duration;

use ctrlc::set_handler;
use notesense_server::{cleanup, models::config::NoteSenseConfig, utils};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(info(
    title = "NoteSense Server",
    description = "Notes with Kanban states, connections between notes, and file text extraction"
))]
struct ApiDoc;

/// Registers the bearer scheme referenced by the authenticated endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    // Configuration comes from environment variables and an optional config
    // file.
    let config = NoteSenseConfig::load()?;
    let db_connection_url = utils::database_url()?;
    let state = notesense_server::init(db_connection_url, config).await?;

    let cleanup_interval =
        Duration::from_secs(state.database_config.blacklist_cleanup_interval_secs.max(1));
    tokio::spawn(cleanup::purge_expired_tokens(
        state.pool.clone(),
        cleanup_interval,
    ));

    let cors = utils::cors_layer(&state.server_config)?;
    let bind_addr = state.server_config.bind_addr.clone();
    let openapi_router =
        OpenApiRouter::with_openapi(ApiDoc::openapi()).merge(notesense_server::router(state));
    let (router, mut api) = openapi_router.split_for_parts();
    SecurityAddon.modify(&mut api);
    let router = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        );

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

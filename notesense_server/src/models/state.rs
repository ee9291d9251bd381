use crate::{
    extractor::Extractor,
    models::config::{AuthConfig, DatabaseConfig, ServerConfig},
    utils,
};

#[derive(Clone)]
pub struct NoteSenseState {
    pub server_config: ServerConfig,
    pub auth_config: AuthConfig,
    pub database_config: DatabaseConfig,
    pub extractor: Extractor,
    pub pool: utils::Pool,
}

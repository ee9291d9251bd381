pub mod blacklist;
pub mod config;
pub mod files;
pub mod notes;
pub mod state;
pub mod users;

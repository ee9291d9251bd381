pub mod connections;
pub mod files;
pub mod kanban;
pub mod notes;
pub mod users;

pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;
use util::config;

/// Opens the application database described by `DATABASE_PATH`.
///
/// A plain file path is treated as a SQLite database (created on demand); anything
/// that already looks like a DSN is passed through untouched.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let url = database_url(config::database_path());

    tracing::info!(url = %url, "Connecting to database");
    Database::connect(&url).await
}

fn database_url(path_or_url: String) -> String {
    if path_or_url.starts_with("sqlite:")
        || path_or_url.starts_with("postgres://")
        || path_or_url.starts_with("mysql://")
    {
        return path_or_url;
    }

    // SQLite won't create intermediate dirs.
    if let Some(parent) = Path::new(&path_or_url).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
        }
    }
    format!("sqlite://{path_or_url}?mode=rwc")
}

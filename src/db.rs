use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("{0} already exists")]
    Duplicate(&'static str),
    /// The row a write hangs off is gone.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

/// Maps a unique violation to `Duplicate(entity)`, everything else to `Backend`.
pub(crate) fn unique_as(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(entity)
        }
        _ => StoreError::from(e),
    }
}

/// Like [`unique_as`], but a foreign key miss becomes `NotFound(parent)`.
pub(crate) fn child_insert_as(
    parent: &'static str,
    entity: &'static str,
) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            StoreError::NotFound(parent)
        }
        _ => unique_as(entity)(e),
    }
}

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    Ok(db)
}

use std::collections::BTreeSet;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Pool, Sqlite};

use crate::error::{AppError, DBErrorContext, Result};

pub mod music;
pub mod scores;
pub mod travel;

#[derive(Debug, Clone)]
pub struct DBService {
    pool: Pool<Sqlite>,
}

/// The row as it is after an update, along with the upload paths the update
/// stopped referencing.
#[derive(Debug)]
pub struct Updated<T> {
    pub row: T,
    pub replaced: Vec<String>,
}

impl DBService {
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool_res = SqlitePoolOptions::new()
            .max_connections(4)
            .after_connect(|conn, _meta| {
                // readers don't block the single writer in WAL mode
                // See https://www.sqlite.org/wal.html
                Box::pin(async move {
                    conn.execute("PRAGMA journal_mode=WAL;").await?;
                    Ok(())
                })
            })
            .connect(db_path)
            .await;
        match pool_res {
            Ok(pool) => Ok(DBService { pool }),
            Err(err) => Err(AppError::DBInitError {
                path: db_path.to_owned(),
                source: err,
            }),
        }
    }

    /// A private database living as long as the returned service.
    /// Every connection to `:memory:` opens a distinct database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|source| AppError::DBInitError {
                path: ":memory:".to_owned(),
                source,
            })?;
        Ok(DBService { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Every upload path still stored in a row.
    pub async fn referenced_uploads(&self) -> Result<BTreeSet<String>> {
        let paths = sqlx::query_scalar::<_, String>(
            "SELECT image FROM artist
            UNION SELECT image FROM song
            UNION SELECT audio FROM song
            UNION SELECT image FROM region WHERE image IS NOT NULL
            UNION SELECT image FROM product WHERE image IS NOT NULL
            UNION SELECT image FROM landmark WHERE image IS NOT NULL
            UNION SELECT image FROM terrain WHERE image IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .with_context(|| "Cannot list referenced uploads")?;

        Ok(paths.into_iter().collect())
    }
}

/// Reads `columns` of the row `id` of `table` with a statement that is
/// itself a write. Run first in a transaction, it takes the write lock
/// before any read, so a concurrent writer cannot invalidate the snapshot
/// the update is based on. Every table holding uploads has an `image` column.
fn locking_select(table: &str, columns: &str) -> String {
    format!("UPDATE {table} SET image=image WHERE id=? RETURNING {columns}")
}

/// The previous value of a file column, when a new file took its place.
fn replaced_path(previous: Option<String>, uploaded: Option<&str>) -> Option<String> {
    match (previous, uploaded) {
        (Some(old), Some(new)) if old != new => Some(old),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A migrated database in a file under `dir`, with the pool of a server.
    pub(crate) async fn file_backed(dir: &std::path::Path) -> DBService {
        let path = dir.join("minisites.sqlite");
        std::fs::File::create(&path).unwrap();
        let db = DBService::new(path.to_str().unwrap()).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[test]
    fn replaced_only_when_a_new_file_is_given() {
        assert_eq!(
            replaced_path(Some("/uploads/a.png".into()), Some("/uploads/b.png")),
            Some("/uploads/a.png".to_string())
        );
        assert_eq!(replaced_path(Some("/uploads/a.png".into()), None), None);
        assert_eq!(replaced_path(None, Some("/uploads/b.png")), None);
        assert_eq!(
            replaced_path(Some("/uploads/a.png".into()), Some("/uploads/a.png")),
            None
        );
    }

    #[tokio::test]
    async fn migrations_apply_on_a_fresh_database() {
        let db = DBService::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.referenced_uploads().await.unwrap().is_empty());
    }
}

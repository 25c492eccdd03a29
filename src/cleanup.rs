use std::time::Duration;

use futures::prelude::*;

use crate::{
    db::DBService,
    error::Result,
    upload::{LocalFsUploader, StorageBackend, StoredFile},
};

/// Delete the files of the upload directory that no row references.
/// Files younger than `min_age` are kept, they may belong to a request
/// still in flight. Returns the deleted files.
pub async fn prune_uploads(
    db: &DBService,
    uploads: &LocalFsUploader,
    min_age: Duration,
) -> Result<Vec<StoredFile>> {
    let candidates = uploads.list_older_than(min_age).await?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let referenced = db.referenced_uploads().await?;
    let orphans: Vec<StoredFile> = candidates
        .into_iter()
        .filter(|f| !referenced.contains(&f.public_path()))
        .collect();

    future::try_join_all(orphans.iter().map(|f| delete_file(uploads, f))).await?;

    tracing::info!(
        "deleted {} orphaned uploads, {} paths still referenced",
        orphans.len(),
        referenced.len()
    );
    Ok(orphans)
}

async fn delete_file(uploads: &LocalFsUploader, file: &StoredFile) -> Result<()> {
    tracing::info!("Attempting to delete orphaned upload {}", file.file_name);
    uploads.delete_blob(file).await?;
    tracing::debug!("Successfully deleted {:?}", file.path);
    Ok(())
}

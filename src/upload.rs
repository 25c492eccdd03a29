use std::{
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWrite;

use crate::error::AppError;

/// Where the upload directory is served, and the prefix of every path
/// stored in the database.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MAX_EXTENSION_LEN: usize = 10;

// The metadata of an incoming file field, as sent by the uploading client.
pub(crate) struct InitFile<'file> {
    pub(crate) field_name: &'file str,
    pub(crate) file_name: &'file str,
    pub(crate) content_type: Option<&'file str>,
}

/// A file persisted by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
}

impl StoredFile {
    /// The path under which the file is served and recorded in a row.
    pub fn public_path(&self) -> String {
        format!("{PUBLIC_PREFIX}/{}", self.file_name)
    }
}

/// A trait to persist an upload somewhere.
#[async_trait]
pub(crate) trait StorageBackend
where
    Self::Blob: Send + Unpin + futures::AsyncWrite,
{
    /// Carries the open destination between starting and finalizing the upload.
    type Blob;

    /// To be called just before streaming a file to the backend.
    /// Bytes are written through Self::Blob, the StoredFile is the handle
    /// under which the file can later be found or deleted.
    async fn initiate_upload(
        &self,
        init_file: &InitFile<'_>,
    ) -> Result<(Self::Blob, StoredFile), AppError>;

    /// Must be called right after all the bytes have been written.
    async fn finalize_upload(&self, _blob: Self::Blob) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete_blob(&self, stored: &StoredFile) -> Result<(), AppError>;
}

pub(crate) trait BackendErrorContext<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T, AppError>
    where
        C: ToString + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> BackendErrorContext<T, E> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C, F>(self, f: F) -> Result<T, AppError>
    where
        C: ToString + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|err| AppError::UploadBackendError {
            message: f().to_string(),
            source: Box::new(err),
        })
    }
}

/// Keep the client's extension when it looks like one, lower cased.
pub(crate) fn extension_of(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Fresh, unguessable name for an upload.
pub(crate) fn generate_file_name(client_file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match extension_of(client_file_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsUploader {
    base_path: PathBuf,
}

impl LocalFsUploader {
    pub fn new<P>(base_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a path recorded in the database back to the file on disk.
    /// Anything that isn't a plain file name under the public prefix is refused.
    pub fn resolve_public_path(&self, public_path: &str) -> Option<StoredFile> {
        let file_name = public_path
            .strip_prefix(PUBLIC_PREFIX)?
            .strip_prefix('/')?;
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.starts_with('.')
        {
            return None;
        }
        Some(StoredFile {
            file_name: file_name.to_owned(),
            path: self.base_path.join(file_name),
        })
    }

    /// Delete the files behind paths that rows no longer reference.
    /// Failures are logged, the files are simply left behind.
    pub async fn delete_replaced(&self, public_paths: &[String]) {
        for public_path in public_paths {
            let stored = match self.resolve_public_path(public_path) {
                Some(s) => s,
                None => {
                    tracing::warn!("Not deleting {public_path}, not an upload path");
                    continue;
                }
            };
            match self.delete_blob(&stored).await {
                Ok(()) => tracing::info!("Deleted replaced upload {public_path}"),
                Err(err) => tracing::warn!("Cannot delete replaced upload {public_path}: {err:?}"),
            }
        }
    }

    /// Regular files in the upload directory last modified more than `min_age` ago.
    pub async fn list_older_than(&self, min_age: Duration) -> Result<Vec<StoredFile>, AppError> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .with_context(|| format!("Cannot read upload directory {:?}", &self.base_path))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Cannot read upload directory {:?}", &self.base_path))?
        {
            let metadata = entry
                .metadata()
                .await
                .with_context(|| format!("Cannot stat {:?}", entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < min_age {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                files.push(StoredFile {
                    file_name: file_name.to_owned(),
                    path: entry.path(),
                });
            }
        }
        Ok(files)
    }
}

#[pin_project::pin_project]
pub(crate) struct LocalFsBlob {
    #[pin]
    inner: File,
    path: PathBuf,
}

impl futures::AsyncWrite for LocalFsBlob {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[async_trait]
impl StorageBackend for LocalFsUploader {
    type Blob = LocalFsBlob;

    async fn initiate_upload(
        &self,
        init_file: &InitFile<'_>,
    ) -> Result<(LocalFsBlob, StoredFile), AppError> {
        let file_name = generate_file_name(init_file.file_name);
        let path = self.base_path.join(&file_name);
        tracing::debug!(
            "Storing field {} ({:?}, {:?}) at {:?}",
            init_file.field_name,
            init_file.file_name,
            init_file.content_type,
            &path
        );

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .await
            .with_context(|| format!("Cannot save file to {:?}", &path))?;
        Ok((
            LocalFsBlob {
                inner: file,
                path: path.clone(),
            },
            StoredFile { file_name, path },
        ))
    }

    async fn finalize_upload(&self, mut blob: Self::Blob) -> Result<(), AppError> {
        futures::AsyncWriteExt::flush(&mut blob)
            .await
            .with_context(|| format!("Cannot flush {:?}", &blob.path))?;
        blob.inner
            .sync_all()
            .await
            .with_context(|| format!("Cannot sync all to {:?}", &blob.path))?;
        Ok(())
    }

    async fn delete_blob(&self, stored: &StoredFile) -> Result<(), AppError> {
        fs::remove_file(&stored.path)
            .await
            .with_context(|| format!("Cannot delete file at {:?}", &stored.path))?;
        Ok(())
    }
}

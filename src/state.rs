use crate::{db::DBService, error::Result, upload::LocalFsUploader};

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DBService,
    pub uploads: LocalFsUploader,
    /// Largest multipart body accepted by the admin routes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub async fn new(db_path: &str, upload_dir: &str, max_upload_bytes: usize) -> Result<Self> {
        let db = DBService::new(db_path).await?;
        Ok(Self::from_parts(
            db,
            LocalFsUploader::new(upload_dir),
            max_upload_bytes,
        ))
    }

    pub fn from_parts(db: DBService, uploads: LocalFsUploader, max_upload_bytes: usize) -> Self {
        Self {
            db,
            uploads,
            max_upload_bytes,
        }
    }
}

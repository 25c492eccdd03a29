use axum::{
    extract::multipart::MultipartError,
    response::{IntoResponse, Response},
    Json,
};
use hyper::StatusCode;
use sqlx::error::ErrorKind;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("DB error at {path}: {source}")]
    DBInitError { path: String, source: sqlx::Error },

    #[error("DB error {message} - {source}")]
    DBError {
        message: String,
        source: sqlx::Error,
    },

    #[error("Migration error {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed multipart body {0}")]
    MultipartError(#[from] MultipartError),

    #[error("Upload error {0}")]
    UploadError(#[from] std::io::Error),

    #[error("Cannot save blob {message} - {source}")]
    UploadBackendError {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{message}: {source}")]
    Failed {
        message: &'static str,
        source: Box<AppError>,
    },
}

impl AppError {
    pub(crate) fn invalid(message: &str) -> Self {
        AppError::InvalidInput(message.to_owned())
    }

    pub(crate) fn not_found(message: &str) -> Self {
        AppError::NotFound(message.to_owned())
    }

    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_)
                | AppError::NotFound(_)
                | AppError::Conflict(_)
                | AppError::MultipartError(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::MultipartError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::InvalidInput(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => msg,
            AppError::MultipartError(ref err) => {
                tracing::info!("Rejected multipart body: {err}");
                "Invalid input".to_string()
            }
            AppError::Failed {
                message,
                ref source,
            } => {
                tracing::error!("{message}: {source:?}");
                message.to_string()
            }
            _ => {
                tracing::error!("Server error: {self:?}");
                "Internal server error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(crate) trait DBErrorContext<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: ToString + Send + Sync + 'static,
        F: FnOnce() -> C;

    /// Classify constraint violations raised by a write. A foreign key
    /// failure means the referenced parent row is gone, a unique failure
    /// means the natural key is already taken.
    fn with_constraints(self, action: &str, missing_parent: &str, duplicate: &str) -> Result<T>;
}

impl<T> DBErrorContext<T> for sqlx::Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: ToString + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|source| AppError::DBError {
            message: f().to_string(),
            source,
        })
    }

    fn with_constraints(self, action: &str, missing_parent: &str, duplicate: &str) -> Result<T> {
        self.map_err(|source| {
            let kind = source.as_database_error().map(|err| err.kind());
            match kind {
                Some(ErrorKind::ForeignKeyViolation) => AppError::not_found(missing_parent),
                Some(ErrorKind::UniqueViolation) => AppError::Conflict(duplicate.to_owned()),
                _ => AppError::DBError {
                    message: action.to_owned(),
                    source,
                },
            }
        })
    }
}

/// Replace the message of a server side failure with the one a route
/// reports to its clients. Client errors go through untouched.
pub(crate) trait FailureContext<T> {
    fn or_fail(self, message: &'static str) -> Result<T>;
}

impl<T> FailureContext<T> for Result<T> {
    fn or_fail(self, message: &'static str) -> Result<T> {
        self.map_err(|err| {
            if err.is_client_error() || matches!(err, AppError::Failed { .. }) {
                err
            } else {
                AppError::Failed {
                    message,
                    source: Box::new(err),
                }
            }
        })
    }
}

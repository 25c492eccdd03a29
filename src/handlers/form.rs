use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::Request;
use futures::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upload::{InitFile, LocalFsUploader, StorageBackend, StoredFile};

struct FormFile {
    field: String,
    stored: StoredFile,
    claimed: bool,
}

/// A multipart body once every field has been read. Text fields are kept in
/// memory, file fields are already on disk.
///
/// Files have to be claimed by the handler with `take_file`. `settle` must be
/// called with the outcome of the handler: on success the unclaimed files
/// are deleted, on failure every file of the request is.
pub(crate) struct ParsedForm {
    uploads: LocalFsUploader,
    texts: HashMap<String, String>,
    files: Vec<FormFile>,
}

/// Extractor reading a whole multipart body into a `ParsedForm`.
pub(crate) struct UploadForm(pub(crate) ParsedForm);

#[async_trait]
impl FromRequest<AppState, Body> for UploadForm {
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &AppState) -> Result<Self> {
        let multipart = Multipart::from_request(req, state).await.map_err(|rejection| {
            tracing::info!("Not a multipart body: {rejection}");
            AppError::invalid("Invalid input")
        })?;
        ParsedForm::collect(multipart, &state.uploads)
            .await
            .map(UploadForm)
    }
}

impl ParsedForm {
    pub(crate) fn new(uploads: LocalFsUploader) -> Self {
        Self {
            uploads,
            texts: HashMap::new(),
            files: Vec::new(),
        }
    }

    pub(crate) async fn collect(mut multipart: Multipart, uploads: &LocalFsUploader) -> Result<Self> {
        let mut form = ParsedForm::new(uploads.clone());
        match form.read_fields(&mut multipart).await {
            Ok(()) => Ok(form),
            Err(err) => {
                form.delete_files(|_| true).await;
                Err(err)
            }
        }
    }

    async fn read_fields(&mut self, multipart: &mut Multipart) -> Result<()> {
        while let Some(mut field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(n) => n.to_owned(),
                None => continue,
            };

            let file_name = match field.file_name() {
                None => {
                    let value = field.text().await?;
                    self.texts.insert(name, value);
                    continue;
                }
                Some(f) => f.to_owned(),
            };
            let content_type = field.content_type().map(str::to_owned);
            let init_file = InitFile {
                field_name: &name,
                file_name: &file_name,
                content_type: content_type.as_deref(),
            };

            let (mut blob, stored) = self.uploads.initiate_upload(&init_file).await?;
            self.files.push(FormFile {
                field: name.clone(),
                stored,
                claimed: false,
            });

            // a broken body surfaces as a MultipartError, a failing disk as io
            let mut bytes_copied = 0;
            while let Some(chunk) = field.chunk().await? {
                blob.write_all(&chunk).await?;
                bytes_copied += chunk.len();
            }

            if bytes_copied == 0 {
                // an empty file input counts as no file at all
                drop(blob);
                if let Some(empty) = self.files.pop() {
                    self.uploads.delete_blob(&empty.stored).await?;
                }
                tracing::debug!("Empty file for field {name}");
                continue;
            }

            self.uploads.finalize_upload(blob).await?;
            tracing::info!(
                "Stored {}Kib for field {name} ({file_name}) at {:?}",
                bytes_copied / 1024,
                self.files.last().map(|f| &f.stored.path)
            );
        }
        Ok(())
    }

    /// The trimmed text field, `None` when absent or blank.
    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Claim the file sent under `name`, returning the path to record in a row.
    /// The last file wins when the field was repeated.
    pub(crate) fn take_file(&mut self, name: &str) -> Option<String> {
        let file = self
            .files
            .iter_mut()
            .rev()
            .find(|f| f.field == name && !f.claimed)?;
        file.claimed = true;
        Some(file.stored.public_path())
    }

    pub(crate) async fn settle<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.delete_files(|f| !f.claimed).await;
                Ok(value)
            }
            Err(err) => {
                self.delete_files(|_| true).await;
                Err(err)
            }
        }
    }

    async fn delete_files<F>(&self, which: F)
    where
        F: Fn(&FormFile) -> bool,
    {
        for file in self.files.iter().filter(|f| which(f)) {
            if let Err(err) = self.uploads.delete_blob(&file.stored).await {
                tracing::warn!(
                    "Cannot delete upload of field {} at {:?}: {err:?}",
                    file.field,
                    file.stored.path
                );
            }
        }
    }
}

/// Parse an integer the way a form sends one.
pub(crate) fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub(crate) fn parse_latitude(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|lat| (-90.0..=90.0).contains(lat))
}

pub(crate) fn parse_longitude(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|lng| (-180.0..=180.0).contains(lng))
}

/// An optional query parameter holding an id. Blank counts as absent.
pub(crate) fn optional_id(raw: Option<&str>, message: &str) -> Result<Option<i64>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_int(r).map(Some).ok_or_else(|| AppError::invalid(message)),
    }
}

/// An optional form field that must parse when it is present.
pub(crate) fn optional_field<T, F>(form: &ParsedForm, name: &str, parse: F) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<T>,
{
    match form.text(name) {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| AppError::invalid("Invalid input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> ParsedForm {
        let mut form = ParsedForm::new(LocalFsUploader::new("/nonexistent"));
        for (k, v) in fields {
            form.texts.insert(k.to_string(), v.to_string());
        }
        form
    }

    #[test]
    fn blank_text_is_absent() {
        let form = form(&[("name", "  Aomori "), ("description", "   ")]);
        assert_eq!(form.text("name"), Some("Aomori"));
        assert_eq!(form.text("description"), None);
        assert_eq!(form.text("missing"), None);
    }

    #[test]
    fn numbers_must_parse_fully() {
        assert_eq!(parse_int(" 12 "), Some(12));
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn coordinates_are_range_checked() {
        assert_eq!(parse_latitude("40.8244"), Some(40.8244));
        assert_eq!(parse_latitude("91"), None);
        assert_eq!(parse_longitude("-180"), Some(-180.0));
        assert_eq!(parse_longitude("180.5"), None);
    }

    #[test]
    fn optional_ids() {
        assert_eq!(optional_id(None, "bad").unwrap(), None);
        assert_eq!(optional_id(Some(""), "bad").unwrap(), None);
        assert_eq!(optional_id(Some("7"), "bad").unwrap(), Some(7));
        let err = optional_id(Some("seven"), "Invalid region ID").unwrap_err();
        assert_eq!(err.to_string(), "Invalid region ID");
    }

    #[test]
    fn optional_fields_reject_garbage() {
        let form = form(&[("ranking", "1"), ("productionAmount", "lots")]);
        assert_eq!(optional_field(&form, "ranking", parse_int).unwrap(), Some(1));
        assert_eq!(optional_field(&form, "latitude", parse_latitude).unwrap(), None);
        assert!(optional_field(&form, "productionAmount", parse_number).is_err());
    }
}

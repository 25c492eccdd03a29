use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db::music::{Artist, ArtistFields, ArtistWithSongs};
use crate::error::{AppError, FailureContext, Result};
use crate::handlers::form::{optional_id, parse_int, ParsedForm, UploadForm};
use crate::state::AppState;

#[derive(serde::Deserialize, Debug)]
pub(crate) struct ArtistQuery {
    id: Option<String>,
}

pub(crate) async fn list_artists(
    State(state): State<AppState>,
    Query(query): Query<ArtistQuery>,
) -> Result<Json<Vec<ArtistWithSongs>>> {
    let id = optional_id(query.id.as_deref(), "Invalid artist ID")?;
    let artists = state
        .db
        .list_artists(id)
        .await
        .or_fail("Failed to fetch artists")?;
    Ok(Json(artists))
}

pub(crate) async fn create_artist(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<(StatusCode, Json<Artist>)> {
    let outcome = insert_artist(&state, &mut form).await;
    let artist = form.settle(outcome).await.or_fail("Failed to add artist")?;
    Ok((StatusCode::CREATED, Json(artist)))
}

async fn insert_artist(state: &AppState, form: &mut ParsedForm) -> Result<Artist> {
    let image = form.take_file("image");
    let (name, profile, image) = match (form.text("name"), form.text("profile"), image) {
        (Some(n), Some(p), Some(i)) => (n, p, i),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    state
        .db
        .create_artist(&ArtistFields { name, profile }, &image)
        .await
}

pub(crate) async fn update_artist(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<Json<Artist>> {
    let outcome = save_artist(&state, &mut form).await;
    let updated = form
        .settle(outcome)
        .await
        .or_fail("Failed to update artist")?;
    state.uploads.delete_replaced(&updated.replaced).await;
    Ok(Json(updated.row))
}

async fn save_artist(
    state: &AppState,
    form: &mut ParsedForm,
) -> Result<crate::db::Updated<Artist>> {
    let image = form.take_file("image");
    let (id, name, profile) = match (form.text("id"), form.text("name"), form.text("profile")) {
        (Some(i), Some(n), Some(p)) => (i, n, p),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    let id = parse_int(id).ok_or_else(|| AppError::invalid("Invalid input"))?;
    state
        .db
        .update_artist(id, &ArtistFields { name, profile }, image.as_deref())
        .await
}

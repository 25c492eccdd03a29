use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::db::music::{NewSong, Song, SongFilter, SongUpdate, SongWithArtist};
use crate::db::Updated;
use crate::error::{AppError, FailureContext, Result};
use crate::handlers::form::{optional_id, parse_int, ParsedForm, UploadForm};
use crate::state::AppState;

#[derive(serde::Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SongQuery {
    artist_id: Option<String>,
    song_ids: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct PlayCounted {
    message: &'static str,
    song: SongWithArtist,
}

impl SongQuery {
    fn filter(&self) -> Result<SongFilter> {
        let artist_id = optional_id(self.artist_id.as_deref(), "Invalid artist ID")?;
        let song_ids = match self.song_ids.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.split(',')
                    .map(parse_int)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| AppError::invalid("Invalid song IDs"))?,
            ),
        };

        Ok(match (song_ids, artist_id) {
            (Some(ids), _) => SongFilter::Ids(ids),
            (None, Some(artist_id)) => SongFilter::Artist(artist_id),
            (None, None) => SongFilter::All,
        })
    }
}

pub(crate) async fn list_songs(
    State(state): State<AppState>,
    Query(query): Query<SongQuery>,
) -> Result<Json<Vec<SongWithArtist>>> {
    let filter = query.filter()?;
    let songs = state
        .db
        .list_songs(&filter)
        .await
        .or_fail("Failed to fetch songs")?;
    Ok(Json(songs))
}

pub(crate) async fn create_song(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<(StatusCode, Json<Song>)> {
    let outcome = insert_song(&state, &mut form).await;
    let song = form.settle(outcome).await.or_fail("Failed to add song")?;
    Ok((StatusCode::CREATED, Json(song)))
}

async fn insert_song(state: &AppState, form: &mut ParsedForm) -> Result<Song> {
    let image = form.take_file("image");
    let audio = form.take_file("audio");
    let (title, artist_id, image, audio) =
        match (form.text("title"), form.text("artistId"), image, audio) {
            (Some(t), Some(a), Some(i), Some(au)) => (t, a, i, au),
            _ => return Err(AppError::invalid("Invalid input")),
        };
    let artist_id = parse_int(artist_id).ok_or_else(|| AppError::invalid("Invalid input"))?;

    state
        .db
        .create_song(&NewSong {
            title,
            artist_id,
            image: &image,
            audio: &audio,
        })
        .await
}

pub(crate) async fn update_song(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<Json<SongWithArtist>> {
    let outcome = save_song(&state, &mut form).await;
    let updated = form.settle(outcome).await.or_fail("Failed to update song")?;
    state.uploads.delete_replaced(&updated.replaced).await;
    Ok(Json(updated.row))
}

async fn save_song(state: &AppState, form: &mut ParsedForm) -> Result<Updated<SongWithArtist>> {
    let image = form.take_file("image");
    let audio = form.take_file("audio");
    let (id, title, artist_id) = match (form.text("id"), form.text("title"), form.text("artistId"))
    {
        (Some(i), Some(t), Some(a)) => (i, t, a),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    let (id, artist_id) = match (parse_int(id), parse_int(artist_id)) {
        (Some(i), Some(a)) => (i, a),
        _ => return Err(AppError::invalid("Invalid input")),
    };

    state
        .db
        .update_song(&SongUpdate {
            id,
            title,
            artist_id,
            image: image.as_deref(),
            audio: audio.as_deref(),
        })
        .await
}

#[tracing::instrument(skip(state), level = "debug")]
pub(crate) async fn increment_play_count(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<PlayCounted>> {
    let song_id = parse_int(&raw_id)
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::invalid("Invalid song ID"))?;

    let song = state
        .db
        .increment_play_count(song_id)
        .await
        .or_fail("Failed to increment play count")?
        .ok_or_else(|| AppError::not_found("Song not found"))?;

    Ok(Json(PlayCounted {
        message: "Play count incremented successfully",
        song,
    }))
}

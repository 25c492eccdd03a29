use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db::travel::{Place, PlaceFields, PlaceKind, WithRegion};
use crate::db::Updated;
use crate::error::{AppError, FailureContext, Result};
use crate::handlers::form::{
    optional_id, parse_int, parse_latitude, parse_longitude, ParsedForm, UploadForm,
};
use crate::handlers::products::RegionQuery;
use crate::state::AppState;

fn failure(kind: PlaceKind, action: Action) -> &'static str {
    match (kind, action) {
        (PlaceKind::Landmark, Action::List) => "Failed to fetch landmarks",
        (PlaceKind::Landmark, Action::Create) => "Failed to add landmark",
        (PlaceKind::Landmark, Action::Update) => "Failed to update landmark",
        (PlaceKind::Terrain, Action::List) => "Failed to fetch terrains",
        (PlaceKind::Terrain, Action::Create) => "Failed to add terrain",
        (PlaceKind::Terrain, Action::Update) => "Failed to update terrain",
    }
}

#[derive(Clone, Copy)]
enum Action {
    List,
    Create,
    Update,
}

pub(crate) async fn list_landmarks(
    state: State<AppState>,
    query: Query<RegionQuery>,
) -> Result<Json<Vec<WithRegion<Place>>>> {
    list(PlaceKind::Landmark, state, query).await
}

pub(crate) async fn list_terrains(
    state: State<AppState>,
    query: Query<RegionQuery>,
) -> Result<Json<Vec<WithRegion<Place>>>> {
    list(PlaceKind::Terrain, state, query).await
}

pub(crate) async fn create_landmark(
    state: State<AppState>,
    form: UploadForm,
) -> Result<(StatusCode, Json<Place>)> {
    create(PlaceKind::Landmark, state, form).await
}

pub(crate) async fn create_terrain(
    state: State<AppState>,
    form: UploadForm,
) -> Result<(StatusCode, Json<Place>)> {
    create(PlaceKind::Terrain, state, form).await
}

pub(crate) async fn update_landmark(state: State<AppState>, form: UploadForm) -> Result<Json<Place>> {
    update(PlaceKind::Landmark, state, form).await
}

pub(crate) async fn update_terrain(state: State<AppState>, form: UploadForm) -> Result<Json<Place>> {
    update(PlaceKind::Terrain, state, form).await
}

async fn list(
    kind: PlaceKind,
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Vec<WithRegion<Place>>>> {
    let region_id = optional_id(query.region_id.as_deref(), "Invalid region ID")?;
    let places = state
        .db
        .list_places(kind, region_id)
        .await
        .or_fail(failure(kind, Action::List))?;
    Ok(Json(places))
}

async fn create(
    kind: PlaceKind,
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<(StatusCode, Json<Place>)> {
    let outcome = insert_place(kind, &state, &mut form).await;
    let place = form
        .settle(outcome)
        .await
        .or_fail(failure(kind, Action::Create))?;
    Ok((StatusCode::CREATED, Json(place)))
}

async fn update(
    kind: PlaceKind,
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<Json<Place>> {
    let outcome = save_place(kind, &state, &mut form).await;
    let updated = form
        .settle(outcome)
        .await
        .or_fail(failure(kind, Action::Update))?;
    state.uploads.delete_replaced(&updated.replaced).await;
    Ok(Json(updated.row))
}

fn place_fields<'f>(
    form: &'f ParsedForm,
    image: Option<&'f str>,
    bad_numbers: &str,
) -> Result<PlaceFields<'f>> {
    let (name, region_id, latitude, longitude) = match (
        form.text("name"),
        form.text("regionId"),
        form.text("latitude"),
        form.text("longitude"),
    ) {
        (Some(n), Some(r), Some(lat), Some(lng)) => (n, r, lat, lng),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    match (
        parse_int(region_id),
        parse_latitude(latitude),
        parse_longitude(longitude),
    ) {
        (Some(region_id), Some(latitude), Some(longitude)) => Ok(PlaceFields {
            name,
            region_id,
            latitude,
            longitude,
            description: form.text("description"),
            image,
        }),
        _ => Err(AppError::invalid(bad_numbers)),
    }
}

async fn insert_place(kind: PlaceKind, state: &AppState, form: &mut ParsedForm) -> Result<Place> {
    let image = form.take_file("image");
    let fields = place_fields(
        form,
        image.as_deref(),
        "Invalid region ID, latitude or longitude",
    )?;
    state.db.create_place(kind, &fields).await
}

async fn save_place(
    kind: PlaceKind,
    state: &AppState,
    form: &mut ParsedForm,
) -> Result<Updated<Place>> {
    const BAD_NUMBERS: &str = "Invalid ID, region ID, latitude or longitude";
    let image = form.take_file("image");
    let raw_id = form
        .text("id")
        .ok_or_else(|| AppError::invalid("Invalid input"))?;
    let fields = place_fields(form, image.as_deref(), BAD_NUMBERS)?;
    let id = parse_int(raw_id).ok_or_else(|| AppError::invalid(BAD_NUMBERS))?;
    state.db.update_place(kind, id, &fields).await
}

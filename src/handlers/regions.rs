use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db::travel::{Region, RegionDetail, RegionFields, RegionSummary};
use crate::db::Updated;
use crate::error::{AppError, FailureContext, Result};
use crate::handlers::form::{parse_int, parse_latitude, parse_longitude, ParsedForm, UploadForm};
use crate::state::AppState;

pub(crate) async fn list_regions(State(state): State<AppState>) -> Result<Json<Vec<RegionSummary>>> {
    let regions = state
        .db
        .list_regions()
        .await
        .or_fail("Failed to fetch regions")?;
    Ok(Json(regions))
}

#[tracing::instrument(skip(state), level = "debug")]
pub(crate) async fn get_region(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<RegionDetail>> {
    let id = parse_int(&raw_id).ok_or_else(|| AppError::invalid("Invalid region ID"))?;
    let region = state
        .db
        .get_region(id)
        .await
        .or_fail("Failed to fetch region")?
        .ok_or_else(|| AppError::not_found("Region not found"))?;
    Ok(Json(region))
}

// name, prefectureCode and coordinates, `bad_numbers` is reported when the
// coordinates don't parse
fn region_fields<'f>(
    form: &'f ParsedForm,
    image: Option<&'f str>,
    bad_numbers: &str,
) -> Result<RegionFields<'f>> {
    let (name, prefecture_code, latitude, longitude) = match (
        form.text("name"),
        form.text("prefectureCode"),
        form.text("latitude"),
        form.text("longitude"),
    ) {
        (Some(n), Some(p), Some(lat), Some(lng)) => (n, p, lat, lng),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    let (latitude, longitude) = match (parse_latitude(latitude), parse_longitude(longitude)) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return Err(AppError::invalid(bad_numbers)),
    };
    Ok(RegionFields {
        name,
        prefecture_code,
        latitude,
        longitude,
        description: form.text("description"),
        image,
    })
}

pub(crate) async fn create_region(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<(StatusCode, Json<Region>)> {
    let outcome = insert_region(&state, &mut form).await;
    let region = form.settle(outcome).await.or_fail("Failed to add region")?;
    Ok((StatusCode::CREATED, Json(region)))
}

async fn insert_region(state: &AppState, form: &mut ParsedForm) -> Result<Region> {
    let image = form.take_file("image");
    let fields = region_fields(form, image.as_deref(), "Invalid latitude or longitude")?;
    state.db.create_region(&fields).await
}

pub(crate) async fn update_region(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<Json<Region>> {
    let outcome = save_region(&state, &mut form).await;
    let updated = form
        .settle(outcome)
        .await
        .or_fail("Failed to update region")?;
    state.uploads.delete_replaced(&updated.replaced).await;
    Ok(Json(updated.row))
}

async fn save_region(state: &AppState, form: &mut ParsedForm) -> Result<Updated<Region>> {
    const BAD_NUMBERS: &str = "Invalid ID, latitude or longitude";
    let image = form.take_file("image");
    let raw_id = form
        .text("id")
        .ok_or_else(|| AppError::invalid("Invalid input"))?;
    let fields = region_fields(form, image.as_deref(), BAD_NUMBERS)?;
    let id = parse_int(raw_id).ok_or_else(|| AppError::invalid(BAD_NUMBERS))?;
    state.db.update_region(id, &fields).await
}

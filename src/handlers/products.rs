use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db::travel::{Product, ProductFields, WithRegion};
use crate::db::Updated;
use crate::error::{AppError, FailureContext, Result};
use crate::handlers::form::{
    optional_field, optional_id, parse_int, parse_latitude, parse_longitude, parse_number,
    ParsedForm, UploadForm,
};
use crate::state::AppState;

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegionQuery {
    pub(crate) region_id: Option<String>,
}

pub(crate) async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Vec<WithRegion<Product>>>> {
    let region_id = optional_id(query.region_id.as_deref(), "Invalid region ID")?;
    let products = state
        .db
        .list_products(region_id)
        .await
        .or_fail("Failed to fetch products")?;
    Ok(Json(products))
}

fn product_fields<'f>(
    form: &'f ParsedForm,
    name: &'f str,
    region_id: i64,
    image: Option<&'f str>,
) -> Result<ProductFields<'f>> {
    Ok(ProductFields {
        name,
        region_id,
        production_amount: optional_field(form, "productionAmount", parse_number)?,
        ranking: optional_field(form, "ranking", parse_int)?,
        description: form.text("description"),
        latitude: optional_field(form, "latitude", parse_latitude)?,
        longitude: optional_field(form, "longitude", parse_longitude)?,
        image,
    })
}

pub(crate) async fn create_product(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<(StatusCode, Json<Product>)> {
    let outcome = insert_product(&state, &mut form).await;
    let product = form.settle(outcome).await.or_fail("Failed to add product")?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn insert_product(state: &AppState, form: &mut ParsedForm) -> Result<Product> {
    let image = form.take_file("image");
    let (name, region_id) = match (form.text("name"), form.text("regionId")) {
        (Some(n), Some(r)) => (n, r),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    let region_id = parse_int(region_id).ok_or_else(|| AppError::invalid("Invalid region ID"))?;
    let fields = product_fields(form, name, region_id, image.as_deref())?;
    state.db.create_product(&fields).await
}

pub(crate) async fn update_product(
    State(state): State<AppState>,
    UploadForm(mut form): UploadForm,
) -> Result<Json<Product>> {
    let outcome = save_product(&state, &mut form).await;
    let updated = form
        .settle(outcome)
        .await
        .or_fail("Failed to update product")?;
    state.uploads.delete_replaced(&updated.replaced).await;
    Ok(Json(updated.row))
}

async fn save_product(state: &AppState, form: &mut ParsedForm) -> Result<Updated<Product>> {
    let image = form.take_file("image");
    let (id, name, region_id) = match (form.text("id"), form.text("name"), form.text("regionId")) {
        (Some(i), Some(n), Some(r)) => (i, n, r),
        _ => return Err(AppError::invalid("Invalid input")),
    };
    let (id, region_id) = match (parse_int(id), parse_int(region_id)) {
        (Some(i), Some(r)) => (i, r),
        _ => return Err(AppError::invalid("Invalid ID")),
    };
    let fields = product_fields(form, name, region_id, image.as_deref())?;
    state.db.update_product(id, &fields).await
}

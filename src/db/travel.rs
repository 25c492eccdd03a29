use std::collections::HashMap;

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{locking_select, replaced_path, DBService, Updated};
use crate::error::{AppError, DBErrorContext, Result};

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub prefecture_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
    pub production_amount: Option<f64>,
    pub ranking: Option<i64>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image: Option<String>,
}

/// A landmark or a terrain. Both live in tables of the same shape.
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceKind {
    Landmark,
    Terrain,
}

impl PlaceKind {
    fn table(self) -> &'static str {
        match self {
            PlaceKind::Landmark => "landmark",
            PlaceKind::Terrain => "terrain",
        }
    }

    pub fn not_found(self) -> &'static str {
        match self {
            PlaceKind::Landmark => "Landmark not found",
            PlaceKind::Terrain => "Terrain not found",
        }
    }

    fn duplicate(self) -> &'static str {
        match self {
            PlaceKind::Landmark => "A landmark with this name already exists in the region",
            PlaceKind::Terrain => "A terrain with this name already exists in the region",
        }
    }
}

/// An item along with the region it belongs to.
#[derive(Serialize, Debug, Clone)]
pub struct WithRegion<T> {
    #[serde(flatten)]
    pub item: T,
    pub region: Region,
}

#[derive(Serialize, Debug)]
pub struct RegionSummary {
    #[serde(flatten)]
    pub region: Region,
    pub products: Vec<Product>,
    pub landmarks: Vec<Place>,
    pub terrains: Vec<Place>,
}

#[derive(Serialize, Debug)]
pub struct RegionDetail {
    #[serde(flatten)]
    pub region: Region,
    pub products: Vec<WithRegion<Product>>,
    pub landmarks: Vec<WithRegion<Place>>,
    pub terrains: Vec<WithRegion<Place>>,
}

#[derive(Debug)]
pub struct RegionFields<'input> {
    pub name: &'input str,
    pub prefecture_code: &'input str,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<&'input str>,
    pub image: Option<&'input str>,
}

#[derive(Debug)]
pub struct ProductFields<'input> {
    pub name: &'input str,
    pub region_id: i64,
    pub production_amount: Option<f64>,
    pub ranking: Option<i64>,
    pub description: Option<&'input str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image: Option<&'input str>,
}

#[derive(Debug)]
pub struct PlaceFields<'input> {
    pub name: &'input str,
    pub region_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<&'input str>,
    pub image: Option<&'input str>,
}

const REGION_TAKEN: &str = "A region with this name already exists";
const PRODUCT_TAKEN: &str = "A product with this name already exists in the region";
const REGION_MISSING: &str = "Region not found";

// unranked products go last
const PRODUCT_ORDER: &str = " ORDER BY ranking IS NULL, ranking, id";

fn group_by_region<T, F>(items: Vec<T>, region_of: F) -> HashMap<i64, Vec<T>>
where
    F: Fn(&T) -> i64,
{
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for item in items {
        grouped.entry(region_of(&item)).or_default().push(item);
    }
    grouped
}

fn attach_region<T>(items: Vec<T>, region: &Region) -> Vec<WithRegion<T>> {
    items
        .into_iter()
        .map(|item| WithRegion {
            item,
            region: region.clone(),
        })
        .collect()
}

impl DBService {
    pub async fn create_region(&self, fields: &RegionFields<'_>) -> Result<Region> {
        let region = sqlx::query_as::<_, Region>(
            "INSERT INTO region
            (name, prefecture_code, latitude, longitude, description, image)
            VALUES (?,?,?,?,?,?)
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.prefecture_code)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_constraints("Cannot create region", REGION_MISSING, REGION_TAKEN)?;

        tracing::info!("Region {} created with id {}", region.name, region.id);
        Ok(region)
    }

    pub async fn update_region(
        &self,
        id: i64,
        fields: &RegionFields<'_>,
    ) -> Result<Updated<Region>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| "Cannot start transaction")?;

        let previous = sqlx::query_scalar::<_, Option<String>>(&locking_select("region", "image"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Cannot fetch region {id}"))?
            .ok_or_else(|| AppError::not_found(REGION_MISSING))?;

        let region = sqlx::query_as::<_, Region>(
            "UPDATE region
            SET name=?, prefecture_code=?, latitude=?, longitude=?,
            description=COALESCE(?, description), image=COALESCE(?, image)
            WHERE id=?
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.prefecture_code)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .with_constraints("Cannot update region", REGION_MISSING, REGION_TAKEN)?;

        tx.commit()
            .await
            .with_context(|| format!("Cannot commit update of region {id}"))?;

        tracing::info!("Region {} updated", region.id);
        Ok(Updated {
            row: region,
            replaced: replaced_path(previous, fields.image).into_iter().collect(),
        })
    }

    /// Insert the region, or refresh every column of the one with that name.
    pub async fn upsert_region(&self, fields: &RegionFields<'_>) -> Result<Region> {
        sqlx::query_as::<_, Region>(
            "INSERT INTO region
            (name, prefecture_code, latitude, longitude, description, image)
            VALUES (?,?,?,?,?,?)
            ON CONFLICT (name) DO UPDATE SET
            prefecture_code=excluded.prefecture_code,
            latitude=excluded.latitude,
            longitude=excluded.longitude,
            description=excluded.description,
            image=COALESCE(excluded.image, image)
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.prefecture_code)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Cannot upsert region {}", fields.name))
    }

    pub async fn list_regions(&self) -> Result<Vec<RegionSummary>> {
        let regions = sqlx::query_as::<_, Region>("SELECT * FROM region ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .with_context(|| "Cannot list regions")?;

        let products =
            sqlx::query_as::<_, Product>(&format!("SELECT * FROM product{PRODUCT_ORDER}"))
                .fetch_all(&self.pool)
                .await
                .with_context(|| "Cannot list products")?;
        let landmarks = self.places(PlaceKind::Landmark, None).await?;
        let terrains = self.places(PlaceKind::Terrain, None).await?;

        let mut products = group_by_region(products, |p| p.region_id);
        let mut landmarks = group_by_region(landmarks, |p| p.region_id);
        let mut terrains = group_by_region(terrains, |p| p.region_id);

        Ok(regions
            .into_iter()
            .map(|region| RegionSummary {
                products: products.remove(&region.id).unwrap_or_default(),
                landmarks: landmarks.remove(&region.id).unwrap_or_default(),
                terrains: terrains.remove(&region.id).unwrap_or_default(),
                region,
            })
            .collect())
    }

    pub async fn get_region(&self, id: i64) -> Result<Option<RegionDetail>> {
        let region = sqlx::query_as::<_, Region>("SELECT * FROM region WHERE id=?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Cannot fetch region {id}"))?;
        let region = match region {
            None => return Ok(None),
            Some(r) => r,
        };

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM product WHERE region_id=?{PRODUCT_ORDER}"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Cannot list products of region {id}"))?;
        let landmarks = self.places(PlaceKind::Landmark, Some(id)).await?;
        let terrains = self.places(PlaceKind::Terrain, Some(id)).await?;

        Ok(Some(RegionDetail {
            products: attach_region(products, &region),
            landmarks: attach_region(landmarks, &region),
            terrains: attach_region(terrains, &region),
            region,
        }))
    }

    async fn regions_by_id(&self, ids: impl IntoIterator<Item = i64>) -> Result<HashMap<i64, Region>> {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM region WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let regions = query
            .build_query_as::<Region>()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Cannot fetch regions {ids:?}"))?;
        Ok(regions.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn with_regions<T, F>(&self, items: Vec<T>, region_of: F) -> Result<Vec<WithRegion<T>>>
    where
        F: Fn(&T) -> i64,
    {
        let regions = self.regions_by_id(items.iter().map(&region_of)).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let region_id = region_of(&item);
                match regions.get(&region_id) {
                    Some(region) => Some(WithRegion {
                        item,
                        region: region.clone(),
                    }),
                    None => {
                        tracing::warn!("Dangling reference to region {region_id}");
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn create_product(&self, fields: &ProductFields<'_>) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO product
            (name, region_id, production_amount, ranking, description, latitude, longitude, image)
            VALUES (?,?,?,?,?,?,?,?)
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.production_amount)
        .bind(fields.ranking)
        .bind(fields.description)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_constraints("Cannot create product", REGION_MISSING, PRODUCT_TAKEN)?;

        tracing::info!(
            "Product {} created with id {} in region {}",
            product.name,
            product.id,
            product.region_id
        );
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: i64,
        fields: &ProductFields<'_>,
    ) -> Result<Updated<Product>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| "Cannot start transaction")?;

        let previous =
            sqlx::query_scalar::<_, Option<String>>(&locking_select("product", "image"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Cannot fetch product {id}"))?
                .ok_or_else(|| AppError::not_found("Product not found"))?;

        let product = sqlx::query_as::<_, Product>(
            "UPDATE product
            SET name=?, region_id=?,
            production_amount=COALESCE(?, production_amount),
            ranking=COALESCE(?, ranking),
            description=COALESCE(?, description),
            latitude=COALESCE(?, latitude),
            longitude=COALESCE(?, longitude),
            image=COALESCE(?, image)
            WHERE id=?
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.production_amount)
        .bind(fields.ranking)
        .bind(fields.description)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.image)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .with_constraints("Cannot update product", REGION_MISSING, PRODUCT_TAKEN)?;

        tx.commit()
            .await
            .with_context(|| format!("Cannot commit update of product {id}"))?;

        tracing::info!("Product {} updated", product.id);
        Ok(Updated {
            row: product,
            replaced: replaced_path(previous, fields.image).into_iter().collect(),
        })
    }

    pub async fn upsert_product(&self, fields: &ProductFields<'_>) -> Result<Product> {
        sqlx::query_as::<_, Product>(
            "INSERT INTO product
            (name, region_id, production_amount, ranking, description, latitude, longitude, image)
            VALUES (?,?,?,?,?,?,?,?)
            ON CONFLICT (name, region_id) DO UPDATE SET
            production_amount=excluded.production_amount,
            ranking=excluded.ranking,
            description=excluded.description,
            latitude=excluded.latitude,
            longitude=excluded.longitude,
            image=COALESCE(excluded.image, image)
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.production_amount)
        .bind(fields.ranking)
        .bind(fields.description)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_constraints("Cannot upsert product", REGION_MISSING, PRODUCT_TAKEN)
    }

    pub async fn list_products(&self, region_id: Option<i64>) -> Result<Vec<WithRegion<Product>>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM product WHERE (? IS NULL OR region_id = ?){PRODUCT_ORDER}"
        ))
        .bind(region_id)
        .bind(region_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| "Cannot list products")?;

        self.with_regions(products, |p| p.region_id).await
    }

    async fn places(&self, kind: PlaceKind, region_id: Option<i64>) -> Result<Vec<Place>> {
        sqlx::query_as::<_, Place>(&format!(
            "SELECT * FROM {} WHERE (? IS NULL OR region_id = ?) ORDER BY id",
            kind.table()
        ))
        .bind(region_id)
        .bind(region_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Cannot list {}s", kind.table()))
    }

    pub async fn list_places(
        &self,
        kind: PlaceKind,
        region_id: Option<i64>,
    ) -> Result<Vec<WithRegion<Place>>> {
        let places = self.places(kind, region_id).await?;
        self.with_regions(places, |p| p.region_id).await
    }

    pub async fn create_place(&self, kind: PlaceKind, fields: &PlaceFields<'_>) -> Result<Place> {
        let place = sqlx::query_as::<_, Place>(&format!(
            "INSERT INTO {}
            (name, region_id, latitude, longitude, description, image)
            VALUES (?,?,?,?,?,?)
            RETURNING *",
            kind.table()
        ))
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_constraints("Cannot create place", REGION_MISSING, kind.duplicate())?;

        tracing::info!(
            "{:?} {} created with id {} in region {}",
            kind,
            place.name,
            place.id,
            place.region_id
        );
        Ok(place)
    }

    pub async fn update_place(
        &self,
        kind: PlaceKind,
        id: i64,
        fields: &PlaceFields<'_>,
    ) -> Result<Updated<Place>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| "Cannot start transaction")?;

        let previous = sqlx::query_scalar::<_, Option<String>>(&locking_select(kind.table(), "image"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Cannot fetch {} {id}", kind.table()))?
        .ok_or_else(|| AppError::not_found(kind.not_found()))?;

        let place = sqlx::query_as::<_, Place>(&format!(
            "UPDATE {}
            SET name=?, region_id=?, latitude=?, longitude=?,
            description=COALESCE(?, description), image=COALESCE(?, image)
            WHERE id=?
            RETURNING *",
            kind.table()
        ))
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .with_constraints("Cannot update place", REGION_MISSING, kind.duplicate())?;

        tx.commit()
            .await
            .with_context(|| format!("Cannot commit update of {} {id}", kind.table()))?;

        tracing::info!("{:?} {} updated", kind, place.id);
        Ok(Updated {
            row: place,
            replaced: replaced_path(previous, fields.image).into_iter().collect(),
        })
    }

    pub async fn upsert_place(&self, kind: PlaceKind, fields: &PlaceFields<'_>) -> Result<Place> {
        sqlx::query_as::<_, Place>(&format!(
            "INSERT INTO {}
            (name, region_id, latitude, longitude, description, image)
            VALUES (?,?,?,?,?,?)
            ON CONFLICT (name, region_id) DO UPDATE SET
            latitude=excluded.latitude,
            longitude=excluded.longitude,
            description=excluded.description,
            image=COALESCE(excluded.image, image)
            RETURNING *",
            kind.table()
        ))
        .bind(fields.name)
        .bind(fields.region_id)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(fields.description)
        .bind(fields.image)
        .fetch_one(&self.pool)
        .await
        .with_constraints("Cannot upsert place", REGION_MISSING, kind.duplicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> DBService {
        let db = DBService::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn region<'a>(name: &'a str) -> RegionFields<'a> {
        RegionFields {
            name,
            prefecture_code: "02",
            latitude: 40.8244,
            longitude: 140.7406,
            description: Some("apples"),
            image: None,
        }
    }

    fn product<'a>(name: &'a str, region_id: i64, ranking: Option<i64>) -> ProductFields<'a> {
        ProductFields {
            name,
            region_id,
            production_amount: None,
            ranking,
            description: None,
            latitude: None,
            longitude: None,
            image: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_place_updates_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::tests::file_backed(dir.path()).await;
        let region_id = db.create_region(&region("Kochi")).await.unwrap().id;
        let place = |image: Option<&'static str>| PlaceFields {
            name: "Katsurahama",
            region_id,
            latitude: 33.4969,
            longitude: 133.5747,
            description: None,
            image,
        };
        let id = db
            .create_place(PlaceKind::Landmark, &place(None))
            .await
            .unwrap()
            .id;

        let updates = (0..24).map(|n| {
            let db = db.clone();
            let image = if n % 2 == 0 { Some("/uploads/beach.png") } else { None };
            let fields = place(image);
            tokio::spawn(async move { db.update_place(PlaceKind::Landmark, id, &fields).await })
        });
        for result in futures::future::join_all(updates).await {
            let updated = result.unwrap().unwrap();
            assert!(updated.replaced.is_empty());
            assert_eq!(updated.row.name, "Katsurahama");
        }

        let listed = db.list_places(PlaceKind::Landmark, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item.image.as_deref(), Some("/uploads/beach.png"));
        db.close().await;
    }

    #[tokio::test]
    async fn region_names_are_unique() {
        let db = db().await;
        db.create_region(&region("Aomori")).await.unwrap();
        let err = db.create_region(&region("Aomori")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn products_are_ordered_by_ranking_unranked_last() {
        let db = db().await;
        let r = db.create_region(&region("Aomori")).await.unwrap();
        db.create_product(&product("Unranked", r.id, None)).await.unwrap();
        db.create_product(&product("Second", r.id, Some(2))).await.unwrap();
        db.create_product(&product("First", r.id, Some(1))).await.unwrap();

        let listed = db.list_products(Some(r.id)).await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.item.name.as_str()).collect();
        assert_eq!(names, ["First", "Second", "Unranked"]);
        assert!(listed.iter().all(|p| p.region.name == "Aomori"));
    }

    #[tokio::test]
    async fn children_need_an_existing_region() {
        let db = db().await;
        let err = db
            .create_place(
                PlaceKind::Terrain,
                &PlaceFields {
                    name: "Delta",
                    region_id: 7,
                    latitude: 37.9,
                    longitude: 139.0,
                    description: None,
                    image: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Region not found"));
    }

    #[tokio::test]
    async fn absent_optional_fields_are_kept_on_update() {
        let db = db().await;
        let r = db.create_region(&region("Aomori")).await.unwrap();
        let mut fields = product("Apple", r.id, Some(1));
        fields.description = Some("crunchy");
        fields.image = Some("/uploads/apple.png");
        let p = db.create_product(&fields).await.unwrap();

        let mut fields = product("Apple", r.id, None);
        fields.production_amount = Some(450000.0);
        let updated = db.update_product(p.id, &fields).await.unwrap();
        assert_eq!(updated.row.ranking, Some(1));
        assert_eq!(updated.row.description.as_deref(), Some("crunchy"));
        assert_eq!(updated.row.production_amount, Some(450000.0));
        assert_eq!(updated.row.image.as_deref(), Some("/uploads/apple.png"));
        assert!(updated.replaced.is_empty());
    }

    #[tokio::test]
    async fn region_detail_nests_children() {
        let db = db().await;
        let r = db.create_region(&region("Sendai")).await.unwrap();
        let other = db.create_region(&region("Aomori")).await.unwrap();
        db.create_place(
            PlaceKind::Landmark,
            &PlaceFields {
                name: "Castle ruins",
                region_id: r.id,
                latitude: 38.25,
                longitude: 140.85,
                description: None,
                image: None,
            },
        )
        .await
        .unwrap();
        db.create_product(&product("Apple", other.id, Some(1)))
            .await
            .unwrap();

        let detail = db.get_region(r.id).await.unwrap().unwrap();
        assert_eq!(detail.landmarks.len(), 1);
        assert_eq!(detail.landmarks[0].region.id, r.id);
        assert!(detail.products.is_empty());
        assert!(detail.terrains.is_empty());

        let summaries = db.list_regions().await.unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.region.name.as_str()).collect();
        assert_eq!(names, ["Aomori", "Sendai"]);
        assert_eq!(summaries[0].products.len(), 1);
        assert_eq!(summaries[1].landmarks.len(), 1);

        assert!(db.get_region(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upserts_refresh_in_place() {
        let db = db().await;
        let first = db.upsert_region(&region("Aomori")).await.unwrap();
        let mut changed = region("Aomori");
        changed.description = Some("capital of the prefecture");
        let second = db.upsert_region(&changed).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.description.as_deref(), Some("capital of the prefecture"));
        assert_eq!(db.list_regions().await.unwrap().len(), 1);
    }
}

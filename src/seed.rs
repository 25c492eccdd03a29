// Sample travel data, loaded by `minisitesadmin seed`. Every row is upserted
// on its natural key so the seed can be re-run after the sample set changes.

use crate::db::travel::{PlaceFields, PlaceKind, ProductFields, RegionFields};
use crate::db::DBService;
use crate::error::Result;

struct SampleRegion {
    name: &'static str,
    prefecture_code: &'static str,
    latitude: f64,
    longitude: f64,
    description: &'static str,
    products: &'static [SampleProduct],
    landmarks: &'static [SamplePlace],
    terrains: &'static [SamplePlace],
}

struct SampleProduct {
    name: &'static str,
    production_amount: Option<f64>,
    ranking: Option<i64>,
    description: &'static str,
}

struct SamplePlace {
    name: &'static str,
    latitude: f64,
    longitude: f64,
    description: &'static str,
}

const REGIONS: &[SampleRegion] = &[
    SampleRegion {
        name: "Aomori",
        prefecture_code: "02",
        latitude: 40.8244,
        longitude: 140.74,
        description: "Northern tip of Honshu, facing Hokkaido across the Tsugaru Strait.",
        products: &[
            SampleProduct {
                name: "Apples",
                production_amount: Some(415_700.0),
                ranking: Some(1),
                description: "More than half of the apples grown in Japan.",
            },
            SampleProduct {
                name: "Garlic",
                production_amount: Some(13_500.0),
                ranking: Some(1),
                description: "Grown around Takko.",
            },
        ],
        landmarks: &[SamplePlace {
            name: "Hirosaki Castle",
            latitude: 40.6079,
            longitude: 140.4636,
            description: "Edo period keep surrounded by cherry trees.",
        }],
        terrains: &[SamplePlace {
            name: "Shirakami Mountains",
            latitude: 40.4667,
            longitude: 140.1167,
            description: "Primeval beech forest.",
        }],
    },
    SampleRegion {
        name: "Morioka",
        prefecture_code: "03",
        latitude: 39.7036,
        longitude: 141.1527,
        description: "Capital of Iwate, between the Kitakami and Ou ranges.",
        products: &[SampleProduct {
            name: "Nanbu ironware",
            production_amount: None,
            ranking: None,
            description: "Cast iron kettles made since the Edo period.",
        }],
        landmarks: &[SamplePlace {
            name: "Morioka Castle Ruins",
            latitude: 39.6995,
            longitude: 141.1506,
            description: "Stone walls of the former Nanbu domain castle.",
        }],
        terrains: &[SamplePlace {
            name: "Sanriku ria coast",
            latitude: 39.6417,
            longitude: 141.9569,
            description: "Drowned river valleys forming deep bays.",
        }],
    },
    SampleRegion {
        name: "Sendai",
        prefecture_code: "04",
        latitude: 38.2682,
        longitude: 140.8694,
        description: "Largest city of Tohoku, known as the city of trees.",
        products: &[
            SampleProduct {
                name: "Oysters",
                production_amount: Some(22_300.0),
                ranking: Some(2),
                description: "Farmed in the bays of the Sanriku coast.",
            },
            SampleProduct {
                name: "Sasakamaboko",
                production_amount: None,
                ranking: None,
                description: "Fish cake shaped like a bamboo leaf.",
            },
        ],
        landmarks: &[SamplePlace {
            name: "Matsushima",
            latitude: 38.3686,
            longitude: 141.0644,
            description: "Bay dotted with pine covered islets.",
        }],
        terrains: &[SamplePlace {
            name: "Sendai Plain",
            latitude: 38.2,
            longitude: 140.95,
            description: "Coastal plain of the Natori and Abukuma rivers.",
        }],
    },
    SampleRegion {
        name: "Niigata",
        prefecture_code: "15",
        latitude: 37.9161,
        longitude: 139.0364,
        description: "Rice country on the Sea of Japan.",
        products: &[SampleProduct {
            name: "Koshihikari rice",
            production_amount: Some(620_000.0),
            ranking: Some(1),
            description: "The most planted rice cultivar in the country.",
        }],
        landmarks: &[SamplePlace {
            name: "Sado Island",
            latitude: 38.0186,
            longitude: 138.3683,
            description: "Former gold mining island.",
        }],
        terrains: &[SamplePlace {
            name: "Echigo Plain",
            latitude: 37.85,
            longitude: 139.1,
            description: "Alluvial plain of the Shinano and Agano rivers.",
        }],
    },
    SampleRegion {
        name: "Shizuoka",
        prefecture_code: "22",
        latitude: 34.9756,
        longitude: 138.3828,
        description: "Pacific coast between Tokyo and Nagoya, under Mount Fuji.",
        products: &[
            SampleProduct {
                name: "Green tea",
                production_amount: Some(28_600.0),
                ranking: Some(1),
                description: "Grown on the Makinohara plateau.",
            },
            SampleProduct {
                name: "Wasabi",
                production_amount: None,
                ranking: Some(1),
                description: "Cultivated in the clear streams of the Izu peninsula.",
            },
        ],
        landmarks: &[SamplePlace {
            name: "Miho no Matsubara",
            latitude: 34.9953,
            longitude: 138.5239,
            description: "Pine grove beach with a view of Mount Fuji.",
        }],
        terrains: &[SamplePlace {
            name: "Oi River alluvial fan",
            latitude: 34.85,
            longitude: 138.2,
            description: "Fan shaped deposit where the Oi leaves the mountains.",
        }],
    },
    SampleRegion {
        name: "Kochi",
        prefecture_code: "39",
        latitude: 33.5597,
        longitude: 133.5311,
        description: "Southern Shikoku, open to the Pacific.",
        products: &[
            SampleProduct {
                name: "Bonito",
                production_amount: None,
                ranking: None,
                description: "Seared over straw fire as katsuo no tataki.",
            },
            SampleProduct {
                name: "Yuzu",
                production_amount: Some(12_000.0),
                ranking: Some(1),
                description: "Citrus from the mountain villages.",
            },
        ],
        landmarks: &[SamplePlace {
            name: "Katsurahama",
            latitude: 33.4969,
            longitude: 133.5747,
            description: "Crescent beach facing the Pacific.",
        }],
        terrains: &[SamplePlace {
            name: "Shimanto River",
            latitude: 33.0,
            longitude: 132.9333,
            description: "River without large dams, with low water crossing bridges.",
        }],
    },
    SampleRegion {
        name: "Miyazaki",
        prefecture_code: "45",
        latitude: 31.9077,
        longitude: 131.4202,
        description: "Eastern coast of Kyushu with a mild climate.",
        products: &[SampleProduct {
            name: "Mango",
            production_amount: Some(1_100.0),
            ranking: Some(2),
            description: "Greenhouse mangoes ripened on the tree.",
        }],
        landmarks: &[SamplePlace {
            name: "Takachiho Gorge",
            latitude: 32.7026,
            longitude: 131.3008,
            description: "Basalt gorge carved by the Gokase river.",
        }],
        terrains: &[SamplePlace {
            name: "Oyodo River delta",
            latitude: 31.9,
            longitude: 131.45,
            description: "Delta where the Oyodo reaches the Hyuga Sea.",
        }],
    },
];

/// How many rows of each kind were written.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub regions: usize,
    pub products: usize,
    pub landmarks: usize,
    pub terrains: usize,
}

pub async fn seed(db: &DBService) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for sample in REGIONS {
        let region = db
            .upsert_region(&RegionFields {
                name: sample.name,
                prefecture_code: sample.prefecture_code,
                latitude: sample.latitude,
                longitude: sample.longitude,
                description: Some(sample.description),
                image: None,
            })
            .await?;
        report.regions += 1;

        for product in sample.products {
            db.upsert_product(&ProductFields {
                name: product.name,
                region_id: region.id,
                production_amount: product.production_amount,
                ranking: product.ranking,
                description: Some(product.description),
                latitude: None,
                longitude: None,
                image: None,
            })
            .await?;
            report.products += 1;
        }

        for (kind, places) in [
            (PlaceKind::Landmark, sample.landmarks),
            (PlaceKind::Terrain, sample.terrains),
        ] {
            for place in places {
                db.upsert_place(
                    kind,
                    &PlaceFields {
                        name: place.name,
                        region_id: region.id,
                        latitude: place.latitude,
                        longitude: place.longitude,
                        description: Some(place.description),
                        image: None,
                    },
                )
                .await?;
                match kind {
                    PlaceKind::Landmark => report.landmarks += 1,
                    PlaceKind::Terrain => report.terrains += 1,
                }
            }
        }
        tracing::info!("Seeded region {}", sample.name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeding_twice_updates_in_place() {
        let db = DBService::in_memory().await.unwrap();
        db.migrate().await.unwrap();

        let first = seed(&db).await.unwrap();
        let second = seed(&db).await.unwrap();
        assert_eq!(first, second);

        let regions = db.list_regions().await.unwrap();
        assert_eq!(regions.len(), REGIONS.len());
        assert_eq!(db.list_products(None).await.unwrap().len(), first.products);
        assert_eq!(
            db.list_places(PlaceKind::Terrain, None).await.unwrap().len(),
            first.terrains
        );
    }

    #[test]
    fn sample_coordinates_are_valid() {
        for region in REGIONS {
            assert!((-90.0..=90.0).contains(&region.latitude));
            assert!((-180.0..=180.0).contains(&region.longitude));
            for place in region.landmarks.iter().chain(region.terrains) {
                assert!((-90.0..=90.0).contains(&place.latitude), "{}", place.name);
            }
        }
    }
}

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{routing, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{artists, places, products, regions, scores, songs};
use crate::state::AppState;
use crate::upload::PUBLIC_PREFIX;

pub fn build(state: AppState) -> Router<()> {
    let service = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    let uploads = state.uploads.base_path().to_path_buf();

    Router::new()
        .nest("/api", public_api())
        .nest("/admin/api", admin_api(state.max_upload_bytes))
        .nest_service(
            PUBLIC_PREFIX,
            routing::get_service(ServeDir::new(uploads)).handle_error(
                |err: std::io::Error| async move {
                    tracing::error!("Error serving upload: {err:?}");
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:?}"))
                },
            ),
        )
        .layer(service)
        .with_state(state)
}

fn public_api() -> Router<AppState> {
    Router::new()
        .route(
            "/scores",
            routing::get(scores::get_rankings).post(scores::submit_score),
        )
        .route("/artists", routing::get(artists::list_artists))
        .route("/songs", routing::get(songs::list_songs))
        .route("/songs/:id", routing::put(songs::increment_play_count))
        .route("/regions", routing::get(regions::list_regions))
        .route("/regions/:id", routing::get(regions::get_region))
        .route("/products", routing::get(products::list_products))
        .route("/landmarks", routing::get(places::list_landmarks))
        .route("/terrains", routing::get(places::list_terrains))
}

fn admin_api(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/artists",
            routing::post(artists::create_artist).put(artists::update_artist),
        )
        .route(
            "/songs",
            routing::post(songs::create_song).put(songs::update_song),
        )
        .route(
            "/regions",
            routing::post(regions::create_region).put(regions::update_region),
        )
        .route(
            "/products",
            routing::post(products::create_product).put(products::update_product),
        )
        .route(
            "/landmarks",
            routing::post(places::create_landmark).put(places::update_landmark),
        )
        .route(
            "/terrains",
            routing::post(places::create_terrain).put(places::update_terrain),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

use axum::http::HeaderValue;
use common::utils::config::AppConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// CORS policy from `cors_allowed_origins`. Unparseable origins are skipped.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allow_origin = match config.allowed_origins() {
        None => AllowOrigin::any(),
        Some(origins) => AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(%origin, "Ignoring invalid CORS origin"))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

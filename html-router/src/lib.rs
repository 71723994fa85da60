pub mod html_state;
pub mod middlewares;
pub mod routes;

use axum::{extract::FromRef, middleware::from_fn_with_state, Router};
use html_state::HtmlState;
use middlewares::response_middleware::with_template_response;

/// Html routes: the single page plus its three form endpoints.
pub fn html_routes<S>(app_state: &HtmlState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    let max_body_bytes = app_state.config.ingest_max_body_bytes;

    Router::new()
        .merge(routes::index::router())
        .merge(routes::documents::router(max_body_bytes))
        .merge(routes::chat::router())
        .merge(routes::questionnaire::router(max_body_bytes))
        .layer(from_fn_with_state(
            app_state.clone(),
            with_template_response::<HtmlState>,
        ))
}

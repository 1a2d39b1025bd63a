use super::{handlers, state::AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/tools", get(handlers::tools_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/chat", post(handlers::chat_handler))
        .route("/reset", post(handlers::reset_handler))
        .route("/catalog", get(handlers::catalog_list_handler))
        .route("/catalog/ingest", post(handlers::catalog_ingest_handler))
        .route("/catalog/search", get(handlers::catalog_search_handler))
        .route(
            "/catalog/{table_name}",
            delete(handlers::catalog_remove_handler),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

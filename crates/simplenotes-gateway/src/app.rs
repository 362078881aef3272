use axum::{
    routing::{get, post},
    Router,
};
use simplenotes_notify::NotificationService;
use simplenotes_push::LocalGateway;
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub service: NotificationService,
    /// Present only when sockets terminate in this process (`push.mode = "local"`).
    pub local: Option<Arc<LocalGateway>>,
}

impl AppState {
    pub fn new(service: NotificationService, local: Option<Arc<LocalGateway>>) -> Self {
        Self { service, local }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws/connect", post(crate::http::realtime::connect_handler))
        .route("/ws/message", post(crate::http::realtime::message_handler))
        .route(
            "/ws/disconnect",
            post(crate::http::realtime::disconnect_handler),
        );
    if state.local.is_some() {
        router = router.route("/ws", get(crate::ws::connection::ws_handler));
    }
    router
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

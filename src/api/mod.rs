pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    actuators::{ActuatorBoard, ActuatorControl},
    channels::Channels,
    levels::Thresholds,
    reading_history::HistoryBuffer,
    settings::SettingsStore,
    store::Store,
};

/// Everything the handlers read from or act on.
#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<Channels>,
    pub history: HistoryBuffer,
    pub board: ActuatorBoard,
    pub control: ActuatorControl<Store>,
    pub settings: SettingsStore,
    pub thresholds: Thresholds,
}

impl AppState {
    pub fn new(
        store: Store,
        channels: Channels,
        history: HistoryBuffer,
        board: ActuatorBoard,
        settings: SettingsStore,
        thresholds: Thresholds,
    ) -> Self {
        let control = ActuatorControl::new(store, board.clone(), &channels.actuators);
        Self {
            channels: Arc::new(channels),
            history,
            board,
            control,
            settings,
            thresholds,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/sensors", get(handlers::list_sensors))
        .route("/sensors/{channel}", get(handlers::get_sensor))
        .route("/actuators", get(handlers::list_actuators))
        .route(
            "/actuators/{id}",
            get(handlers::get_actuator).put(handlers::set_actuator),
        )
        .route("/actuators/{id}/toggle", post(handlers::toggle_actuator))
        .route(
            "/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}

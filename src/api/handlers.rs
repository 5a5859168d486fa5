use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{ActuatorDto, ActuatorRequested, ReadingDto, SensorDetail, SensorView, SetActuatorRequest},
    errors::ApiError,
    AppState,
};
use crate::{
    levels::Level,
    models::SensorKind,
    settings::{Settings, SettingsPatch},
    units::{GasUnit, MoistureUnit, TemperatureUnit},
};

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Latest value of every configured sensor channel, converted to the
/// preferred units and classified.
#[utoipa::path(
    get,
    path = "/sensors",
    responses(
        (status = 200, description = "One entry per sensor channel, in configuration order", body = Vec<SensorView>),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(State(state): State<AppState>) -> Json<Vec<SensorView>> {
    let prefs = state.settings.get().units();
    let mut views = Vec::with_capacity(state.channels.sensors.len());
    for channel in &state.channels.sensors {
        let latest = state.history.latest(&channel.id).await;
        views.push(SensorView::new(channel, latest.as_ref(), &prefs, &state.thresholds));
    }
    Json(views)
}

/// One sensor channel with up to the last 20 readings, oldest first.
#[utoipa::path(
    get,
    path = "/sensors/{channel}",
    params(
        ("channel" = String, Path, description = "Sensor channel id, e.g. `moisture3`"),
    ),
    responses(
        (status = 200, description = "Sensor state and recent history", body = SensorDetail),
        (status = 404, description = "Unknown channel"),
    ),
    tag = "sensors"
)]
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<SensorDetail>, ApiError> {
    let sensor = state
        .channels
        .sensor(&channel)
        .ok_or_else(|| ApiError::UnknownChannel(channel.clone()))?;
    let prefs = state.settings.get().units();
    let latest = state.history.latest(&sensor.id).await;
    let readings = state.history.readings(&sensor.id).await;

    Ok(Json(SensorDetail {
        sensor: SensorView::new(sensor, latest.as_ref(), &prefs, &state.thresholds),
        history: readings
            .iter()
            .map(|r| ReadingDto::new(r, sensor.kind, &prefs))
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Confirmed state of every configured actuator. Actuators the store has
/// not reported yet are shown as off.
#[utoipa::path(
    get,
    path = "/actuators",
    responses(
        (status = 200, description = "One entry per actuator, in configuration order", body = Vec<ActuatorDto>),
    ),
    tag = "actuators"
)]
pub async fn list_actuators(State(state): State<AppState>) -> Json<Vec<ActuatorDto>> {
    let mut actuators = Vec::with_capacity(state.channels.actuators.len());
    for id in &state.channels.actuators {
        let status = state.board.get(id).await.unwrap_or_default();
        actuators.push(ActuatorDto::new(id, status));
    }
    Json(actuators)
}

#[utoipa::path(
    get,
    path = "/actuators/{id}",
    params(
        ("id" = String, Path, description = "Actuator id, e.g. `Pump`"),
    ),
    responses(
        (status = 200, description = "Confirmed actuator state", body = ActuatorDto),
        (status = 404, description = "Unknown actuator"),
    ),
    tag = "actuators"
)]
pub async fn get_actuator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActuatorDto>, ApiError> {
    if !state.channels.is_actuator(&id) {
        return Err(ApiError::UnknownChannel(id));
    }
    let status = state.board.get(&id).await.unwrap_or_default();
    Ok(Json(ActuatorDto::new(&id, status)))
}

/// Request an actuator on or off. Answers once the store has accepted the
/// write; the confirmed state follows through the live feed.
#[utoipa::path(
    put,
    path = "/actuators/{id}",
    params(
        ("id" = String, Path, description = "Actuator id, e.g. `Pump`"),
    ),
    request_body = SetActuatorRequest,
    responses(
        (status = 202, description = "Write accepted by the store", body = ActuatorRequested),
        (status = 404, description = "Unknown actuator"),
        (status = 502, description = "Store rejected the write"),
    ),
    tag = "actuators"
)]
pub async fn set_actuator(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetActuatorRequest>,
) -> Result<(StatusCode, Json<ActuatorRequested>), ApiError> {
    state.control.set_actuator(&id, body.is_on).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ActuatorRequested {
            id,
            requested_on: body.is_on,
        }),
    ))
}

/// Request the opposite of the actuator's confirmed state.
#[utoipa::path(
    post,
    path = "/actuators/{id}/toggle",
    params(
        ("id" = String, Path, description = "Actuator id, e.g. `Pump`"),
    ),
    responses(
        (status = 202, description = "Write accepted by the store", body = ActuatorRequested),
        (status = 404, description = "Unknown actuator"),
        (status = 502, description = "Store rejected the write"),
    ),
    tag = "actuators"
)]
pub async fn toggle_actuator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ActuatorRequested>), ApiError> {
    let requested_on = state.control.toggle(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(ActuatorRequested { id, requested_on })))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Current display preferences", body = Settings),
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.get())
}

/// Change some preferences. Fields left out keep their value.
#[utoipa::path(
    patch,
    path = "/settings",
    request_body = SettingsPatch,
    responses(
        (status = 200, description = "Preferences after the update", body = Settings),
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Json<Settings> {
    Json(state.settings.update(patch))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sensors,
        get_sensor,
        list_actuators,
        get_actuator,
        set_actuator,
        toggle_actuator,
        get_settings,
        update_settings,
        health
    ),
    components(schemas(
        SensorView,
        ReadingDto,
        SensorDetail,
        ActuatorDto,
        SetActuatorRequest,
        ActuatorRequested,
        Settings,
        SettingsPatch,
        SensorKind,
        Level,
        TemperatureUnit,
        GasUnit,
        MoistureUnit
    )),
    tags(
        (name = "sensors",   description = "Live sensor readings"),
        (name = "actuators", description = "Actuator state and control"),
        (name = "settings",  description = "Display preferences"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Vermimometer API",
        version = "0.1.0",
        description = "Live readings and actuator control for a vermicomposting bin"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

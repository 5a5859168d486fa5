use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vermimometer::{
    actuators::{ActuatorBoard, STATUS_FIELD},
    api::{self, AppState},
    config::{Config, StoreBackend},
    reading_history::HistoryBuffer,
    sensors::SensorService,
    settings::{Settings, SettingsStore},
    store::{actuator_path, FieldValue, Fields, FirestoreClient, MemoryStore, Store},
    subscriptions::SubscriptionManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let store = match &config.store {
        StoreBackend::Firestore(firestore) => {
            info!(project = %firestore.project_id, database = %firestore.database, "Using Firestore store");
            Store::Firestore(FirestoreClient::new(firestore))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store");
            let memory = MemoryStore::new();
            // Writes only merge into existing documents.
            for id in &config.channels.actuators {
                memory.put(
                    &actuator_path(id),
                    Fields::from([(STATUS_FIELD.to_owned(), FieldValue::Bool(false))]),
                );
            }
            Store::Memory(memory)
        }
    };

    let history = HistoryBuffer::new();
    let board = ActuatorBoard::new();
    let settings = SettingsStore::new(Settings {
        temperature_unit: config.temperature_unit,
        gas_unit: config.gas_unit,
        ..Settings::default()
    });

    let sensors = SensorService::new(store.clone(), history.clone(), config.archive_readings);
    let subscriptions = SubscriptionManager::new(
        store.clone(),
        config.channels.clone(),
        sensors,
        board.clone(),
    );

    // Every channel stays subscribed until the server has shut down.
    let mut scope = subscriptions.scope();
    scope.subscribe_all()?;
    info!(
        sensors = config.channels.sensors.len(),
        actuators = config.channels.actuators.len(),
        "Live feeds open"
    );

    let state = AppState::new(
        store,
        config.channels.clone(),
        history,
        board,
        settings,
        config.thresholds,
    );

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(scope);
    info!("Live feeds closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

mod batch;
mod executor;
mod fetcher;
mod handlers;
mod jobs;
mod logs;
mod registry;
mod state;

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::fetcher::AnalyticsSource;
use crate::jobs::JobStore;
use crate::registry::TaskRegistry;
use crate::state::{AppState, CancelFlags};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("server=debug,axum=info,tower_http=info")
        .init();

    let config_path =
        env::var("REPORTS_CONFIG_PATH").unwrap_or_else(|_| "reports_config.json".to_string());
    let jobs_path = env::var("JOBS_DB_PATH").unwrap_or_else(|_| "jobs_db.json".to_string());

    let registry = TaskRegistry::open(&config_path).expect("no se pudo abrir el registro de tareas");
    let store = JobStore::open(&jobs_path).expect("no se pudo abrir el historial de jobs");

    let state = AppState {
        registry: Arc::new(registry),
        store: Arc::new(store),
        source: Arc::new(AnalyticsSource::from_env()),
        cancels: CancelFlags::default(),
    };

    // router HTTP
    let app = handlers::build_router(state);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("server escuchando en {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

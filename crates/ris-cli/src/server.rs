use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ris_core::{CodebookSource, CycleDriver, FrameFormat};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    driver: Arc<Mutex<CycleDriver>>,
}

impl AppState {
    pub fn new(driver: CycleDriver) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub schedule_index: usize,
    pub schedule_len: usize,
    pub steering_angle: f64,
    pub position_count: usize,
    pub element_count: usize,
    pub codebook_entries: usize,
    pub codebook_source: CodebookSource,
    pub frame_format: FrameFormat,
}

#[derive(Debug, Deserialize)]
pub struct SteeringRequest {
    pub angle: f64,
}

type HandlerError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/frame", get(frame))
        .route("/status", get(status))
        .route("/steering", post(steering))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the next frame of the cycle on each `GET /frame`.
pub async fn frame(State(state): State<AppState>) -> Result<String, HandlerError> {
    let mut driver = state.driver.lock().await;
    let schedule_len = driver.config().schedule.len();
    match driver.next_cycle() {
        Ok(cycle) => {
            crate::transport::log_cycle(&cycle, schedule_len);
            Ok(cycle.frame.into_string())
        }
        Err(e) => {
            tracing::error!("match stage: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Json<Status> {
    let driver = state.driver.lock().await;
    let config = driver.config();
    let codebook = driver.codebook();
    Json(Status {
        schedule_index: driver.schedule_index(),
        schedule_len: config.schedule.len(),
        steering_angle: config.steering_angle_deg,
        position_count: config.position_count,
        element_count: codebook.element_count(),
        codebook_entries: codebook.len(),
        codebook_source: codebook.source(),
        frame_format: config.encoder.format,
    })
}

pub async fn steering(
    State(state): State<AppState>,
    Json(request): Json<SteeringRequest>,
) -> Result<Json<Status>, HandlerError> {
    {
        let mut driver = state.driver.lock().await;
        driver
            .set_steering_angle(request.angle)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        tracing::info!("steering angle set to {}°", request.angle);
    }
    Ok(status(State(state)).await)
}

pub async fn serve(
    driver: CycleDriver,
    bind: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("serving frames on http://{}", listener.local_addr()?);
    axum::serve(listener, router(AppState::new(driver)))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::capture::{self, CaptureConfig};
use crate::state::{EmotionHistogram, SharedState};

/// Everything a request handler needs: the shared snapshot plus the capture
/// configuration used when `/start_camera` spawns a new loop thread.
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
    pub capture: CaptureConfig,
}

#[derive(Serialize)]
struct PeopleCountResponse {
    people_count: usize,
}

pub fn router(app: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/start_camera", get(start_camera))
        .route("/stop_camera", get(stop_camera))
        .route("/people_count", get(people_count))
        .route("/emotion_counts", get(emotion_counts))
        .nest_service("/", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

pub async fn serve(port: u16, app: AppState, static_dir: PathBuf) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving on http://{addr}");
    axum::serve(listener, router(app, static_dir)).await?;
    Ok(())
}

/// Spawns a capture loop thread unless one is already active. Idempotent
/// from the caller's view: the reply is the same either way, and a second
/// `start` while running is a no-op because the flag claim fails.
async fn start_camera(State(app): State<AppState>) -> &'static str {
    if app.shared.claim_start() {
        let shared = app.shared.clone();
        let config = app.capture.clone();
        thread::spawn(move || {
            if let Err(error) = capture::run(&config, &shared) {
                error!("capture loop exited with error: {error:#}");
            }
        });
    }
    "Camera started"
}

/// Fire-and-forget: flips the flag and returns without waiting for the
/// capture loop to observe it.
async fn stop_camera(State(app): State<AppState>) -> &'static str {
    app.shared.request_stop();
    "Camera stopped"
}

async fn people_count(State(app): State<AppState>) -> Json<PeopleCountResponse> {
    Json(PeopleCountResponse {
        people_count: app.shared.snapshot().people,
    })
}

async fn emotion_counts(State(app): State<AppState>) -> Json<EmotionHistogram> {
    Json(app.shared.snapshot().emotions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FrameStats;

    fn test_app() -> AppState {
        AppState {
            shared: Arc::new(SharedState::new()),
            capture: CaptureConfig {
                camera_index: 0,
                cascade: None,
                model: PathBuf::from("emotion.onnx"),
                show_preview: false,
            },
        }
    }

    #[tokio::test]
    async fn test_emotion_counts_before_any_frame_is_all_zero() {
        let app = test_app();
        let Json(histogram) = emotion_counts(State(app)).await;
        assert_eq!(
            serde_json::to_value(&histogram).unwrap(),
            serde_json::json!({
                "angry": 0,
                "disgust": 0,
                "fear": 0,
                "happy": 0,
                "sad": 0,
                "surprise": 0,
                "neutral": 0,
            })
        );
    }

    #[tokio::test]
    async fn test_people_count_reflects_latest_snapshot() {
        let app = test_app();
        app.shared.publish(FrameStats {
            people: 3,
            ..Default::default()
        });
        let Json(body) = people_count(State(app)).await;
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"people_count": 3})
        );
    }

    #[tokio::test]
    async fn test_start_while_running_does_not_spawn_second_loop() {
        let app = test_app();
        // Simulate an already active loop holding the claim.
        assert!(app.shared.claim_start());

        let reply = start_camera(State(app.clone())).await;

        assert_eq!(reply, "Camera started");
        assert!(app.shared.is_running());
    }

    #[tokio::test]
    async fn test_stop_replies_without_waiting() {
        let app = test_app();
        assert!(app.shared.claim_start());

        let reply = stop_camera(State(app.clone())).await;

        assert_eq!(reply, "Camera stopped");
        assert!(!app.shared.is_running());
    }
}

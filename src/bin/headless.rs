use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use emotion_tracker::capture::{self, CaptureConfig};
use emotion_tracker::server::{self, AppState};
use emotion_tracker::state::SharedState;
use tracing::error;

/// Status server without the desktop shell, for machines with no display.
/// The capture loop runs without a preview window and is controlled purely
/// through `/start_camera` and `/stop_camera`.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Camera device index.
    #[clap(short, long, default_value_t = 0)]
    camera_index: i32,

    /// Port for the local status server.
    #[clap(short, long, default_value_t = 8000)]
    port: u16,

    /// Directory served for paths that are not status endpoints.
    #[clap(long, default_value = "static")]
    static_dir: PathBuf,

    /// Haar cascade for face localization. Uses the cascade shipped with
    /// OpenCV when omitted.
    #[clap(long)]
    cascade: Option<PathBuf>,

    /// 7-class emotion classifier in ONNX format.
    #[clap(long, default_value = "models/emotion.onnx")]
    model: PathBuf,

    /// Start capturing immediately instead of waiting for /start_camera.
    #[clap(long)]
    start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    emotion_tracker::init_logging();
    let args = Args::parse();

    let shared = Arc::new(SharedState::new());
    let app = AppState {
        shared: shared.clone(),
        capture: CaptureConfig {
            camera_index: args.camera_index,
            cascade: args.cascade,
            model: args.model,
            show_preview: false,
        },
    };

    if args.start && shared.claim_start() {
        let config = app.capture.clone();
        let state = shared.clone();
        thread::spawn(move || {
            if let Err(error) = capture::run(&config, &state) {
                error!("capture loop exited with error: {error:#}");
            }
        });
    }

    server::serve(args.port, app, args.static_dir).await
}

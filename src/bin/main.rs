use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use emotion_tracker::capture::CaptureConfig;
use emotion_tracker::server::{self, AppState};
use emotion_tracker::shell;
use emotion_tracker::state::SharedState;
use tracing::error;

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
}

fn main() -> anyhow::Result<()> {
    emotion_tracker::init_logging();
    let args = Args::parse();

    let port = args.port;
    let shared = Arc::new(SharedState::new());
    let app = AppState {
        shared: shared.clone(),
        capture: CaptureConfig {
            camera_index: args.camera_index,
            cascade: args.cascade,
            model: args.model,
            show_preview: true,
        },
    };

    // The status server lives on a background runtime; the main thread is
    // reserved for the GUI event loop.
    let runtime = tokio::runtime::Runtime::new()?;
    let static_dir = args.static_dir;
    runtime.spawn(async move {
        if let Err(error) = server::serve(port, app, static_dir).await {
            error!("status server exited: {error:#}");
        }
    });

    let interface_url = format!("http://localhost:{port}/interface.html");
    shell::run(shared, interface_url).map_err(|error| anyhow::anyhow!("GUI error: {error}"))?;

    Ok(())
}

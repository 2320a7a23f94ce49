use thiserror::Error;

pub mod camera;
pub mod capture;
pub mod detector;
pub mod server;
pub mod shell;
pub mod state;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera device {index} not found or could not be opened")]
    DeviceUnavailable { index: i32 },
    #[error("frame capture failed")]
    FrameCapture,
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Microphone acquisition failures. Fatal to starting a turn; the caller
/// decides recovery and the state machine stays out of Listening.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Capture device not found: {name:?}")]
    NotFound { name: Option<String> },

    #[error("Access to the capture device was denied")]
    AccessDenied,

    #[error("Capture format not supported: {0}")]
    FormatNotSupported(String),

    #[error("Capture stream failed: {0}")]
    Stream(String),
}

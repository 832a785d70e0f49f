use thiserror::Error;

/// Failures reported by a browser automation driver.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Failed to subscribe to browser events: {0}")]
    Subscribe(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Driver not ready")]
    NotReady,
    #[error("{0}")]
    Other(String),
}

use harcap_common::error::DriverError;
use std::time::Duration;
use thiserror::Error;

/// Fatal outcomes of a capture run. None of them are retried.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to start browser session: {0}")]
    Launch(#[source] DriverError),
    #[error("Error navigating: {0}")]
    Navigation(String),
    #[error(
        "Capture incomplete: '{milestone}' not reached within {timeout:?} ({pages} page(s), {entries} entr(ies) observed)"
    )]
    IncompleteCapture {
        milestone: String,
        timeout: Duration,
        pages: usize,
        entries: usize,
    },
    #[error("Error marshaling HAR object: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Error writing HAR file {destination}: {source}")]
    Output {
        destination: String,
        #[source]
        source: std::io::Error,
    },
}

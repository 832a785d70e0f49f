use async_trait::async_trait;
pub use harcap_common::error::DriverError;
use harcap_common::event::NetworkEvent;
use std::sync::Arc;

/// Callback invoked by a driver for every network or lifecycle event, in the
/// order the browser reported them.
pub type EventHandler = Arc<dyn Fn(NetworkEvent) + Send + Sync>;

/// Name and version of the browser that produced a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
}

/// The Driver trait is the interface a browser automation session must
/// implement to be captured.
#[async_trait]
pub trait Driver: Send {
    /// Launch the browser and open the page that will be navigated.
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Register the event callback. Must be called before `navigate` so no
    /// request of the page load is missed.
    async fn on_event(&mut self, handler: EventHandler) -> Result<(), DriverError>;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Report the browser product, when the driver can discover it.
    async fn browser_info(&mut self) -> Result<Option<BrowserInfo>, DriverError> {
        Ok(None)
    }

    /// Close the browser and cleanup resources.
    async fn close(&mut self) -> Result<(), DriverError>;
}

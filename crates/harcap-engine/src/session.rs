use crate::capture::{EventDispatcher, capture_channel};
use crate::config::HarcapConfig;
use crate::driver::Driver;
use crate::error::CaptureError;
use crate::output::{OutputTarget, write_har};
use harcap_common::error::DriverError;
use harcap_common::har::{Creator, Har, HarLog};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};

/// Everything a single capture run needs besides the driver.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub target_url: String,
    /// Deadline for the whole run: launch, navigation and capture.
    pub timeout: Duration,
    pub completion_event: String,
    pub creator: Creator,
    /// When set, used instead of asking the driver.
    pub browser: Option<Creator>,
}

impl From<&HarcapConfig> for CaptureSettings {
    fn from(config: &HarcapConfig) -> Self {
        Self {
            target_url: config.capture.target_url.clone(),
            timeout: config.capture.timeout(),
            completion_event: config.capture.completion_event.clone(),
            creator: config.metadata.creator.clone(),
            browser: config.metadata.browser.clone(),
        }
    }
}

/// Owns a driver session for one page capture.
pub struct SessionController<D: Driver> {
    driver: D,
    settings: CaptureSettings,
}

impl<D: Driver> SessionController<D> {
    pub fn new(driver: D, settings: CaptureSettings) -> Self {
        Self { driver, settings }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Capture the target page. The driver is closed on every path.
    pub async fn run(&mut self) -> Result<Har, CaptureError> {
        let deadline = Instant::now() + self.settings.timeout;
        let result = self.capture(deadline).await;
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        result
    }

    /// Capture, then persist the finished log. Nothing is written when the
    /// capture fails.
    pub async fn run_to(&mut self, target: &OutputTarget) -> Result<Har, CaptureError> {
        let har = self.run().await?;
        write_har(&har, target).await?;
        Ok(har)
    }

    async fn capture(&mut self, deadline: Instant) -> Result<Har, CaptureError> {
        let timeout = self.settings.timeout;

        timeout_at(deadline, self.driver.launch())
            .await
            .map_err(|_| {
                CaptureError::Launch(DriverError::Launch(format!("timed out after {:?}", timeout)))
            })?
            .map_err(CaptureError::Launch)?;

        let (intake, completion, aggregator) = capture_channel();
        let dispatcher =
            EventDispatcher::new(intake, completion, self.settings.completion_event.clone());
        self.driver
            .on_event(dispatcher.into_handler())
            .await
            .map_err(CaptureError::Launch)?;

        info!("Navigating to {}", self.settings.target_url);
        match timeout_at(deadline, self.driver.navigate(&self.settings.target_url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(CaptureError::Navigation(e.to_string())),
            Err(_) => {
                return Err(CaptureError::Navigation(format!(
                    "timed out after {:?}",
                    timeout
                )));
            }
        }

        let mut log = HarLog::new(self.settings.creator.clone());
        let drained = timeout_at(deadline, aggregator.drain_into(&mut log)).await;
        if drained.is_err() {
            return Err(CaptureError::IncompleteCapture {
                milestone: self.settings.completion_event.clone(),
                timeout,
                pages: log.pages.len(),
                entries: log.entries.len(),
            });
        }

        log.browser = self.resolve_browser().await;
        Ok(Har { log })
    }

    async fn resolve_browser(&mut self) -> Option<Creator> {
        if let Some(browser) = &self.settings.browser {
            return Some(browser.clone());
        }
        match self.driver.browser_info().await {
            Ok(info) => info.map(|info| Creator {
                name: info.name,
                version: info.version,
                comment: None,
            }),
            Err(e) => {
                warn!("Could not determine browser version: {}", e);
                None
            }
        }
    }
}

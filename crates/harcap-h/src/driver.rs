use crate::cdp::{CdpClient, LaunchOptions};
use crate::events;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EventRequestWillBeSent, EventResponseReceived};
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use futures::stream::BoxStream;
use futures::{StreamExt, future};
use harcap_engine::driver::{BrowserInfo, Driver, DriverError, EventHandler};
use harcap_engine::event::NetworkEvent;
use tokio::task::JoinHandle;
use tracing::info;

/// Headless Chromium session driven over the DevTools protocol.
pub struct HeadlessDriver {
    options: LaunchOptions,
    client: Option<CdpClient>,
    event_pump: Option<JoinHandle<()>>,
}

impl HeadlessDriver {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            client: None,
            event_pump: None,
        }
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new(LaunchOptions::default())
    }
}

fn subscribe_error(e: impl std::fmt::Display) -> DriverError {
    DriverError::Subscribe(e.to_string())
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching headless driver (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn on_event(&mut self, handler: EventHandler) -> Result<(), DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        let page = &client.page;

        let requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(subscribe_error)?;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(subscribe_error)?;
        let lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(subscribe_error)?;

        // Sub-frames report their own lifecycle; only the top-level document
        // decides completion.
        let main_frame = page.mainframe().await.map_err(subscribe_error)?;
        let lifecycle = lifecycle.filter(move |event| {
            future::ready(
                main_frame
                    .as_ref()
                    .is_none_or(|frame| *frame == event.frame_id),
            )
        });

        let requests = requests.map(|event| events::request_event(&event)).boxed();
        let responses = responses.map(|event| events::response_event(&event)).boxed();
        let lifecycle = lifecycle
            .map(|event| events::lifecycle_event(&event))
            .boxed();

        if let Some(previous) = self.event_pump.take() {
            previous.abort();
        }
        self.event_pump = Some(tokio::spawn(pump_events(
            requests, responses, lifecycle, handler,
        )));
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn browser_info(&mut self) -> Result<Option<BrowserInfo>, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        let version = client
            .browser
            .version()
            .await
            .map_err(|e| DriverError::Other(format!("Browser.getVersion failed: {}", e)))?;
        Ok(Some(parse_product(&version.product)))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(pump) = self.event_pump.take() {
            pump.abort();
        }
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }
}

/// Forward listener events to the handler in browser order.
///
/// chromiumoxide fans each protocol event out to its listener channel as it
/// arrives, so by the time a lifecycle event is ready every earlier request
/// and response is already buffered. Polling network streams first keeps a
/// milestone behind the requests that preceded it.
async fn pump_events(
    requests: BoxStream<'static, NetworkEvent>,
    responses: BoxStream<'static, NetworkEvent>,
    lifecycle: BoxStream<'static, NetworkEvent>,
    handler: EventHandler,
) {
    let mut requests = requests.fuse();
    let mut responses = responses.fuse();
    let mut lifecycle = lifecycle.fuse();
    loop {
        tokio::select! {
            biased;

            Some(event) = requests.next() => handler(event),
            Some(event) = responses.next() => handler(event),
            Some(event) = lifecycle.next() => handler(event),
            else => break,
        }
    }
    tracing::debug!("Browser event stream ended");
}

/// `HeadlessChrome/120.0.6099.109` -> name and version.
fn parse_product(product: &str) -> BrowserInfo {
    match product.split_once('/') {
        Some((name, version)) => BrowserInfo {
            name: name.to_string(),
            version: version.to_string(),
        },
        None => BrowserInfo {
            name: product.to_string(),
            version: String::new(),
        },
    }
}

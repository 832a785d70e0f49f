use super::aggregator::{CompletionSignal, Intake};
use super::classifier::{Correlation, classify_request, classify_response, page_id};
use super::{CaptureRecord, PageTimingRecord};
use crate::driver::EventHandler;
use harcap_common::event::{LifecycleEvent, NetworkEvent, RequestWillBeSent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Tracks the top-level document of the capture.
///
/// The first document request opens the page. Every later request is
/// attributed to that page, including sub-frame documents. Redirect hops of
/// the page's own document share its request id and produce no record.
#[derive(Debug, Default)]
pub struct PageTracker {
    active: Option<ActivePage>,
}

#[derive(Debug)]
struct ActivePage {
    request_id: String,
    loader_id: String,
    page_id: String,
}

impl PageTracker {
    /// Decide how a request relates to the page. `None` means the event
    /// produces no record.
    pub fn observe_request(&mut self, event: &RequestWillBeSent) -> Option<Correlation> {
        match &self.active {
            None if event.resource_type.is_document() => {
                self.active = Some(ActivePage {
                    request_id: event.request_id.clone(),
                    loader_id: event.loader_id.clone(),
                    page_id: page_id(&event.request_id),
                });
                Some(Correlation::OpensPage)
            }
            None => Some(Correlation::Within(None)),
            Some(page) if page.request_id == event.request_id => None,
            Some(page) => Some(Correlation::Within(Some(page.page_id.clone()))),
        }
    }

    pub fn is_page_request(&self, request_id: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|page| page.request_id == request_id)
    }

    /// Lifecycle events only count once the page exists and when they belong
    /// to its document load (not the initial `about:blank`).
    pub fn accepts_lifecycle(&self, event: &LifecycleEvent) -> bool {
        self.active
            .as_ref()
            .is_some_and(|page| page.loader_id == event.loader_id)
    }
}

/// Numbers the hops of each redirect chain. The browser reuses a request id
/// for every hop, so the n-th request seen with an id is hop n.
#[derive(Debug, Default)]
pub struct RedirectChains {
    seen: HashMap<String, u32>,
}

impl RedirectChains {
    pub fn next_hop(&mut self, request_id: &str) -> u32 {
        let count = self.seen.entry(request_id.to_string()).or_insert(0);
        let hop = *count;
        *count += 1;
        hop
    }

    /// Hop a response belongs to: the latest request sent with its id.
    pub fn current_hop(&self, request_id: &str) -> u32 {
        self.seen
            .get(request_id)
            .map_or(0, |count| count.saturating_sub(1))
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    pages: PageTracker,
    chains: RedirectChains,
}

/// Routes driver events into the capture. Runs on the driver's dispatch path,
/// so the order it sees events in is the order the browser reported them.
pub struct EventDispatcher {
    intake: Intake,
    completion: CompletionSignal,
    completion_event: String,
    state: Mutex<DispatchState>,
}

impl EventDispatcher {
    pub fn new(
        intake: Intake,
        completion: CompletionSignal,
        completion_event: impl Into<String>,
    ) -> Self {
        Self {
            intake,
            completion,
            completion_event: completion_event.into(),
            state: Mutex::default(),
        }
    }

    pub fn into_handler(self) -> EventHandler {
        let dispatcher = Arc::new(self);
        Arc::new(move |event| dispatcher.dispatch(event))
    }

    pub fn dispatch(&self, event: NetworkEvent) {
        if self.completion.is_complete() {
            tracing::debug!("Capture complete, ignoring late event");
            return;
        }

        match event {
            NetworkEvent::RequestWillBeSent(event) => {
                let mut state = self.state();
                let Some(correlation) = state.pages.observe_request(&event) else {
                    tracing::debug!("Redirect of page document to {}", event.request.url);
                    return;
                };
                let hop = match correlation {
                    Correlation::OpensPage => 0,
                    Correlation::Within(_) => state.chains.next_hop(&event.request_id),
                };
                drop(state);
                self.intake
                    .submit(move || classify_request(&event, &correlation, hop));
            }
            NetworkEvent::ResponseReceived(event) => {
                let state = self.state();
                if state.pages.is_page_request(&event.request_id) {
                    return;
                }
                let hop = state.chains.current_hop(&event.request_id);
                drop(state);
                self.intake.submit(move || classify_response(&event, hop));
            }
            NetworkEvent::Lifecycle(event) => self.on_lifecycle(event),
        }
    }

    fn on_lifecycle(&self, event: LifecycleEvent) {
        if !self.state().pages.accepts_lifecycle(&event) {
            tracing::debug!(
                "Ignoring lifecycle event {} from loader {}",
                event.name,
                event.loader_id
            );
            return;
        }

        if matches!(event.name.as_str(), "DOMContentLoaded" | "load") {
            let record = PageTimingRecord {
                name: event.name.clone(),
                timestamp: event.timestamp,
            };
            self.intake.submit(move || CaptureRecord::PageTiming(record));
        }

        // Only this handler fires completion, after every record of events
        // that preceded the milestone has been submitted.
        if event.name == self.completion_event && self.completion.complete() {
            tracing::info!("Page reached {}, capture complete", event.name);
        }
    }

    fn state(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harcap_common::event::{Headers, RequestInfo, ResourceType};

    fn request(request_id: &str, loader_id: &str, resource_type: ResourceType) -> RequestWillBeSent {
        RequestWillBeSent {
            request_id: request_id.into(),
            loader_id: loader_id.into(),
            resource_type,
            timestamp: 1.0,
            wall_time: 1_700_000_000.0,
            request: RequestInfo {
                method: "GET".into(),
                url: format!("https://example.com/{}", request_id),
                headers: Headers::new(),
            },
            redirect_response: None,
        }
    }

    fn lifecycle(name: &str, loader_id: &str) -> LifecycleEvent {
        LifecycleEvent {
            name: name.into(),
            loader_id: loader_id.into(),
            timestamp: 2.0,
        }
    }

    #[test]
    fn first_document_opens_page_and_later_requests_join_it() {
        let mut tracker = PageTracker::default();
        assert_eq!(
            tracker.observe_request(&request("A", "L1", ResourceType::Document)),
            Some(Correlation::OpensPage)
        );
        assert_eq!(
            tracker.observe_request(&request("B", "L1", ResourceType::Other)),
            Some(Correlation::Within(Some("page_A".into())))
        );
        // A sub-frame document is an entry of the same page.
        assert_eq!(
            tracker.observe_request(&request("C", "L2", ResourceType::Document)),
            Some(Correlation::Within(Some("page_A".into())))
        );
        // Redirect hop of the page document.
        assert_eq!(
            tracker.observe_request(&request("A", "L1", ResourceType::Document)),
            None
        );
        assert!(tracker.is_page_request("A"));
        assert!(!tracker.is_page_request("B"));
    }

    #[test]
    fn requests_before_any_page_have_no_pageref() {
        let mut tracker = PageTracker::default();
        assert_eq!(
            tracker.observe_request(&request("X", "L0", ResourceType::Other)),
            Some(Correlation::Within(None))
        );
    }

    #[test]
    fn redirect_hops_are_numbered_per_request_id() {
        let mut chains = RedirectChains::default();
        assert_eq!(chains.current_hop("7"), 0);
        assert_eq!(chains.next_hop("7"), 0);
        assert_eq!(chains.next_hop("8"), 0);
        assert_eq!(chains.next_hop("7"), 1);
        assert_eq!(chains.current_hop("7"), 1);
        assert_eq!(chains.current_hop("8"), 0);
    }

    #[test]
    fn lifecycle_requires_page_loader() {
        let mut tracker = PageTracker::default();
        assert!(!tracker.accepts_lifecycle(&lifecycle("InteractiveTime", "L1")));
        tracker.observe_request(&request("A", "L1", ResourceType::Document));
        assert!(tracker.accepts_lifecycle(&lifecycle("InteractiveTime", "L1")));
        assert!(!tracker.accepts_lifecycle(&lifecycle("InteractiveTime", "blank")));
    }
}

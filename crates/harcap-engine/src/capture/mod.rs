//! The capture pipeline: classification of driver events into HAR records,
//! fan-in of those records through a single intake, and assembly of the
//! final log.

mod aggregator;
mod assemble;
pub mod classifier;
mod dispatch;

pub use aggregator::{CaptureAggregator, CompletionSignal, Intake, capture_channel};
pub use assemble::CaptureStats;
pub use classifier::Correlation;
pub use dispatch::{EventDispatcher, PageTracker, RedirectChains};

use harcap_common::har::{Entry, Page, Response, Timings};

/// A classified record travelling from a producer task to the aggregator.
#[derive(Debug, Clone)]
pub enum CaptureRecord {
    Page(PageRecord),
    Entry(EntryRecord),
    Response(ResponseRecord),
    PageTiming(PageTimingRecord),
}

#[derive(Debug, Clone)]
pub struct PageRecord {
    pub request_id: String,
    /// Monotonic time of the document request, seconds.
    pub timestamp: f64,
    pub page: Page,
}

#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub request_id: String,
    /// Position in the redirect chain sharing `request_id`, starting at 0.
    pub hop: u32,
    pub entry: Entry,
    /// Completes hop `hop - 1` of the same chain.
    pub previous_hop: Option<ResponseRecord>,
}

#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub request_id: String,
    /// Redirect hop this response answers.
    pub hop: u32,
    pub response: Response,
    pub timings: Option<Timings>,
    pub server_ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageTimingRecord {
    pub name: String,
    pub timestamp: f64,
}

use super::{CaptureRecord, EntryRecord, PageRecord, PageTimingRecord, ResponseRecord};
use harcap_common::har::{Entry, HarLog, PageTimings};
use std::collections::HashMap;

/// Counters describing what a capture assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub pages: usize,
    pub entries: usize,
    pub responses_merged: usize,
    pub responses_discarded: usize,
}

/// Redirect hops share a request id, so entries and responses are matched on
/// the pair.
type HopKey = (String, u32);

/// Applies records to a log in receive order. Owned by the drain loop, so it
/// is the only code that mutates the log during capture. Records may arrive
/// in any order; responses wait for the entry of their hop.
#[derive(Debug, Default)]
pub(super) struct Assembler {
    entries_by_hop: HashMap<HopKey, usize>,
    /// Responses whose entry has not arrived yet.
    pending_responses: HashMap<HopKey, ResponseRecord>,
    page_start: Option<f64>,
    pending_timings: Vec<PageTimingRecord>,
    stats: CaptureStats,
}

impl Assembler {
    pub(super) fn apply(&mut self, log: &mut HarLog, record: CaptureRecord) {
        match record {
            CaptureRecord::Page(page) => self.apply_page(log, page),
            CaptureRecord::Entry(entry) => self.apply_entry(log, entry),
            CaptureRecord::Response(response) => self.apply_response(log, response),
            CaptureRecord::PageTiming(timing) => {
                if self.page_start.is_some() {
                    self.apply_timing(log, timing);
                } else {
                    self.pending_timings.push(timing);
                }
            }
        }
    }

    /// Discard whatever never found its request and return the final counts.
    pub(super) fn finish(mut self) -> CaptureStats {
        for (request_id, hop) in self.pending_responses.keys() {
            tracing::debug!("Discarding response without request: {} (hop {})", request_id, hop);
        }
        self.stats.responses_discarded += self.pending_responses.len();
        self.stats
    }

    fn apply_page(&mut self, log: &mut HarLog, record: PageRecord) {
        tracing::debug!("Page {} opened: {}", record.page.id, record.page.title);
        self.page_start = Some(record.timestamp);
        log.pages.push(record.page);
        self.stats.pages += 1;
        for timing in std::mem::take(&mut self.pending_timings) {
            self.apply_timing(log, timing);
        }
    }

    fn apply_entry(&mut self, log: &mut HarLog, record: EntryRecord) {
        let key = (record.request_id, record.hop);
        let index = log.entries.len();
        log.entries.push(record.entry);
        self.stats.entries += 1;
        if let Some(response) = self.pending_responses.remove(&key) {
            merge_response(&mut log.entries[index], response);
            self.stats.responses_merged += 1;
        }
        self.entries_by_hop.insert(key, index);

        if let Some(previous) = record.previous_hop {
            self.apply_response(log, previous);
        }
    }

    fn apply_response(&mut self, log: &mut HarLog, record: ResponseRecord) {
        let key = (record.request_id.clone(), record.hop);
        match self.entries_by_hop.get(&key).copied() {
            Some(index) if log.entries[index].response.is_none() => {
                merge_response(&mut log.entries[index], record);
                self.stats.responses_merged += 1;
            }
            Some(_) => {
                tracing::debug!("Discarding duplicate response for {}", record.request_id);
                self.stats.responses_discarded += 1;
            }
            None => {
                tracing::trace!("Response for {} arrived before its request", record.request_id);
                if let Some(replaced) = self.pending_responses.insert(key, record) {
                    tracing::debug!("Discarding superseded response for {}", replaced.request_id);
                    self.stats.responses_discarded += 1;
                }
            }
        }
    }

    fn apply_timing(&mut self, log: &mut HarLog, record: PageTimingRecord) {
        let (Some(start), Some(page)) = (self.page_start, log.pages.first_mut()) else {
            return;
        };
        let elapsed_ms = ((record.timestamp - start) * 1000.0).max(0.0);
        let timings = page.page_timings.get_or_insert_with(PageTimings::default);
        match record.name.as_str() {
            "DOMContentLoaded" => timings.on_content_load = Some(elapsed_ms),
            "load" => timings.on_load = Some(elapsed_ms),
            _ => {}
        }
    }
}

fn merge_response(entry: &mut Entry, record: ResponseRecord) {
    if !record.response.http_version.is_empty() {
        entry.request.http_version = Some(record.response.http_version.clone());
    }
    if let Some(timings) = record.timings {
        entry.time = Some(timings.total());
        entry.timings = Some(timings);
    }
    entry.server_ip_address = record.server_ip_address;
    entry.response = Some(record.response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use harcap_common::har::{Content, Creator, Page, Request, Response};

    fn log() -> HarLog {
        HarLog::new(Creator {
            name: "test".into(),
            version: "0".into(),
            comment: None,
        })
    }

    fn entry(request_id: &str, url: &str) -> CaptureRecord {
        hop_entry(request_id, 0, url, None)
    }

    fn hop_entry(
        request_id: &str,
        hop: u32,
        url: &str,
        previous_hop: Option<ResponseRecord>,
    ) -> CaptureRecord {
        CaptureRecord::Entry(EntryRecord {
            request_id: request_id.into(),
            hop,
            entry: Entry {
                pageref: Some("page_1".into()),
                started_date_time: "2024-01-01T00:00:00.000000000Z".into(),
                time: None,
                request: Request {
                    method: "GET".into(),
                    url: url.into(),
                    http_version: None,
                    headers: vec![],
                },
                response: None,
                timings: None,
                server_ip_address: None,
            },
            previous_hop,
        })
    }

    fn response(request_id: &str, status: i64) -> ResponseRecord {
        hop_response(request_id, 0, status)
    }

    fn hop_response(request_id: &str, hop: u32, status: i64) -> ResponseRecord {
        ResponseRecord {
            request_id: request_id.into(),
            hop,
            response: Response {
                status,
                status_text: String::new(),
                http_version: "HTTP/1.1".into(),
                headers: vec![],
                content: Content {
                    size: 10,
                    mime_type: "text/plain".into(),
                },
                redirect_url: String::new(),
            },
            timings: None,
            server_ip_address: None,
        }
    }

    #[test]
    fn response_merges_into_its_entry() {
        let mut log = log();
        let mut assembler = Assembler::default();
        assembler.apply(&mut log, entry("2", "https://example.com/a.css"));
        assembler.apply(&mut log, CaptureRecord::Response(response("2", 200)));

        let stats = assembler.finish();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].response.as_ref().unwrap().status, 200);
        assert_eq!(log.entries[0].request.http_version.as_deref(), Some("HTTP/1.1"));
        assert_eq!(stats.responses_merged, 1);
        assert_eq!(stats.responses_discarded, 0);
    }

    #[test]
    fn response_overtaking_its_request_is_buffered() {
        let mut log = log();
        let mut assembler = Assembler::default();
        assembler.apply(&mut log, CaptureRecord::Response(response("3", 404)));
        assert!(log.entries.is_empty());
        assembler.apply(&mut log, entry("3", "https://example.com/missing.png"));

        assert_eq!(log.entries[0].response.as_ref().unwrap().status, 404);
        assert_eq!(assembler.finish().responses_merged, 1);
    }

    #[test]
    fn unmatched_response_is_discarded_not_appended() {
        let mut log = log();
        let mut assembler = Assembler::default();
        assembler.apply(&mut log, CaptureRecord::Response(response("9", 200)));

        let stats = assembler.finish();
        assert!(log.entries.is_empty());
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.responses_discarded, 1);
    }

    /// `http://` hop 0 answered by a 301, `https://` hop 1 answered by a 200.
    fn redirect_chain() -> [CaptureRecord; 3] {
        let mut moved = hop_response("5", 0, 301);
        moved.response.redirect_url = "https://example.com/app.js".into();
        [
            hop_entry("5", 0, "http://example.com/app.js", None),
            hop_entry("5", 1, "https://example.com/app.js", Some(moved)),
            CaptureRecord::Response(hop_response("5", 1, 200)),
        ]
    }

    fn assert_redirect_chain(log: &HarLog, stats: CaptureStats) {
        assert_eq!(log.entries.len(), 2);
        for entry in &log.entries {
            let response = entry.response.as_ref().unwrap();
            match entry.request.url.as_str() {
                "http://example.com/app.js" => {
                    assert_eq!(response.status, 301);
                    assert_eq!(response.redirect_url, "https://example.com/app.js");
                }
                "https://example.com/app.js" => assert_eq!(response.status, 200),
                other => panic!("unexpected entry {}", other),
            }
        }
        assert_eq!(stats.responses_merged, 2);
        assert_eq!(stats.responses_discarded, 0);
    }

    #[test]
    fn redirect_hop_completes_previous_entry() {
        let mut log = log();
        let mut assembler = Assembler::default();
        for record in redirect_chain() {
            assembler.apply(&mut log, record);
        }
        assert_redirect_chain(&log, assembler.finish());
    }

    #[test]
    fn final_response_before_second_hop_stays_with_second_hop() {
        let [first, second, last] = redirect_chain();
        let mut log = log();
        let mut assembler = Assembler::default();
        for record in [first, last, second] {
            assembler.apply(&mut log, record);
        }
        assert_redirect_chain(&log, assembler.finish());
    }

    #[test]
    fn second_hop_before_first_hop_still_completes_both() {
        let [first, second, last] = redirect_chain();
        let mut log = log();
        let mut assembler = Assembler::default();
        for record in [second, last, first] {
            assembler.apply(&mut log, record);
        }
        assert_redirect_chain(&log, assembler.finish());
    }

    #[test]
    fn duplicate_response_for_a_hop_is_discarded() {
        let mut log = log();
        let mut assembler = Assembler::default();
        assembler.apply(&mut log, entry("4", "https://example.com/a.js"));
        assembler.apply(&mut log, CaptureRecord::Response(response("4", 200)));
        assembler.apply(&mut log, CaptureRecord::Response(response("4", 500)));

        let stats = assembler.finish();
        assert_eq!(log.entries[0].response.as_ref().unwrap().status, 200);
        assert_eq!(stats.responses_merged, 1);
        assert_eq!(stats.responses_discarded, 1);
    }

    #[test]
    fn page_timings_are_relative_to_document_request() {
        let mut log = log();
        let mut assembler = Assembler::default();
        assembler.apply(
            &mut log,
            CaptureRecord::PageTiming(PageTimingRecord {
                name: "DOMContentLoaded".into(),
                timestamp: 10.25,
            }),
        );
        assembler.apply(
            &mut log,
            CaptureRecord::Page(PageRecord {
                request_id: "1".into(),
                timestamp: 10.0,
                page: Page {
                    id: "page_1".into(),
                    started_date_time: "2024-01-01T00:00:00.000000000Z".into(),
                    title: "https://example.com/".into(),
                    page_timings: None,
                },
            }),
        );
        assembler.apply(
            &mut log,
            CaptureRecord::PageTiming(PageTimingRecord {
                name: "load".into(),
                timestamp: 11.0,
            }),
        );

        let timings = log.pages[0].page_timings.as_ref().unwrap();
        assert_eq!(timings.on_content_load, Some(250.0));
        assert_eq!(timings.on_load, Some(1000.0));
    }
}

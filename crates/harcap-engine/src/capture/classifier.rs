//! Turns raw driver events into capture records.
//!
//! Both entry points are pure and cheap; the dispatcher runs them inside
//! spawned producer tasks so header normalization never blocks the driver's
//! event delivery.

use super::{CaptureRecord, EntryRecord, PageRecord, ResponseRecord};
use harcap_common::event::{
    RequestWillBeSent, ResourceTiming, ResponseInfo, ResponseReceived, format_wall_time,
};
use harcap_common::har::{Content, Entry, Page, Request, Response, Timings};
use harcap_common::headers::normalize_headers;

/// How a request relates to the page being captured. Decided on the driver's
/// dispatch path, before classification, so it reflects event order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// The top-level document request that opens the page.
    OpensPage,
    /// A request observed while the given page (if any) was active.
    Within(Option<String>),
}

pub fn page_id(request_id: &str) -> String {
    format!("page_{}", request_id)
}

/// `hop` is the request's position in its redirect chain, stamped by the
/// dispatcher in browser order.
pub fn classify_request(
    event: &RequestWillBeSent,
    correlation: &Correlation,
    hop: u32,
) -> CaptureRecord {
    let started_date_time = format_wall_time(event.wall_time);
    match correlation {
        Correlation::OpensPage => CaptureRecord::Page(PageRecord {
            request_id: event.request_id.clone(),
            timestamp: event.timestamp,
            page: Page {
                id: page_id(&event.request_id),
                started_date_time,
                title: event.request.url.clone(),
                page_timings: None,
            },
        }),
        Correlation::Within(pageref) => {
            let previous_hop = event
                .redirect_response
                .as_ref()
                .zip(hop.checked_sub(1))
                .map(|(redirect, previous)| {
                    response_record(
                        &event.request_id,
                        previous,
                        redirect,
                        event.request.url.clone(),
                    )
                });
            CaptureRecord::Entry(EntryRecord {
                request_id: event.request_id.clone(),
                hop,
                entry: Entry {
                    pageref: pageref.clone(),
                    started_date_time,
                    time: None,
                    request: Request {
                        method: event.request.method.clone(),
                        url: event.request.url.clone(),
                        http_version: None,
                        headers: normalize_headers(&event.request.headers),
                    },
                    response: None,
                    timings: None,
                    server_ip_address: None,
                },
                previous_hop,
            })
        }
    }
}

pub fn classify_response(event: &ResponseReceived, hop: u32) -> CaptureRecord {
    CaptureRecord::Response(response_record(
        &event.request_id,
        hop,
        &event.response,
        String::new(),
    ))
}

fn response_record(
    request_id: &str,
    hop: u32,
    info: &ResponseInfo,
    redirect_url: String,
) -> ResponseRecord {
    ResponseRecord {
        request_id: request_id.to_string(),
        hop,
        response: Response {
            status: info.status,
            status_text: info.status_text.clone(),
            http_version: http_version(info.protocol.as_deref()),
            headers: normalize_headers(&info.headers),
            content: Content {
                size: info.encoded_data_length.max(0.0) as i64,
                mime_type: info.mime_type.clone(),
            },
            redirect_url,
        },
        timings: info.timing.as_ref().map(har_timings),
        server_ip_address: info.remote_ip_address.clone().filter(|ip| !ip.is_empty()),
    }
}

/// Map a DevTools protocol name (`h2`, `http/1.1`, ...) to a HAR version string.
pub fn http_version(protocol: Option<&str>) -> String {
    match protocol {
        Some("h2") => "HTTP/2.0".to_string(),
        Some(p) if p.starts_with("h3") => "HTTP/3.0".to_string(),
        Some(p) => p.to_ascii_uppercase(),
        None => String::new(),
    }
}

/// Phase durations derived the way DevTools exports HAR timings.
pub fn har_timings(timing: &ResourceTiming) -> Timings {
    let phase = |start: f64, end: f64| if start >= 0.0 { end - start } else { -1.0 };
    Timings {
        blocked: least_non_negative(&[timing.dns_start, timing.connect_start, timing.send_start]),
        dns: phase(timing.dns_start, timing.dns_end),
        connect: phase(timing.connect_start, timing.connect_end),
        ssl: phase(timing.ssl_start, timing.ssl_end),
        send: (timing.send_end - timing.send_start).max(0.0),
        wait: (timing.receive_headers_end - timing.send_end).max(0.0),
        receive: 0.0,
    }
}

fn least_non_negative(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| *v >= 0.0)
        .reduce(f64::min)
        .unwrap_or(-1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harcap_common::event::{Headers, RequestInfo, ResourceType};
    use serde_json::json;

    fn request(request_id: &str, resource_type: ResourceType, url: &str) -> RequestWillBeSent {
        let mut headers = Headers::new();
        headers.insert("Accept".into(), json!("*/*"));
        RequestWillBeSent {
            request_id: request_id.into(),
            loader_id: "L1".into(),
            resource_type,
            timestamp: 100.0,
            wall_time: 1_700_000_000.5,
            request: RequestInfo {
                method: "GET".into(),
                url: url.into(),
                headers,
            },
            redirect_response: None,
        }
    }

    fn response_info(status: i64, timing: Option<ResourceTiming>) -> ResponseInfo {
        ResponseInfo {
            url: "https://example.com/app.js".into(),
            status,
            status_text: "OK".into(),
            protocol: Some("h2".into()),
            mime_type: "application/javascript".into(),
            headers: Headers::new(),
            encoded_data_length: 512.0,
            remote_ip_address: Some("93.184.216.34".into()),
            timing,
        }
    }

    #[test]
    fn document_request_opens_page() {
        let event = request("42", ResourceType::Document, "https://example.com/");
        match classify_request(&event, &Correlation::OpensPage, 0) {
            CaptureRecord::Page(record) => {
                assert_eq!(record.page.id, "page_42");
                assert_eq!(record.page.title, "https://example.com/");
                assert_eq!(
                    record.page.started_date_time,
                    "2023-11-14T22:13:20.500000000Z"
                );
                assert_eq!(record.request_id, "42");
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn sub_resource_uses_active_page_as_pageref() {
        let event = request("7.3", ResourceType::Other, "https://example.com/logo.png");
        let correlation = Correlation::Within(Some(page_id("42")));
        match classify_request(&event, &correlation, 0) {
            CaptureRecord::Entry(record) => {
                assert_eq!(record.entry.pageref.as_deref(), Some("page_42"));
                assert_eq!(record.entry.request.method, "GET");
                assert_eq!(record.entry.request.url, "https://example.com/logo.png");
                assert_eq!(record.entry.request.headers.len(), 1);
                assert!(record.previous_hop.is_none());
            }
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[test]
    fn redirected_request_carries_previous_hop() {
        let mut event = request("9", ResourceType::Other, "https://cdn.example.com/app.js");
        event.redirect_response = Some(response_info(302, None));
        let CaptureRecord::Entry(record) =
            classify_request(&event, &Correlation::Within(Some(page_id("1"))), 1)
        else {
            panic!("expected entry");
        };
        assert_eq!(record.hop, 1);
        let hop = record.previous_hop.expect("previous hop");
        assert_eq!(hop.hop, 0);
        assert_eq!(hop.response.status, 302);
        assert_eq!(hop.response.redirect_url, "https://cdn.example.com/app.js");
    }

    #[test]
    fn response_is_never_an_entry() {
        let event = ResponseReceived {
            request_id: "7".into(),
            loader_id: "L1".into(),
            resource_type: ResourceType::Other,
            timestamp: 101.0,
            response: response_info(200, None),
        };
        match classify_response(&event, 2) {
            CaptureRecord::Response(record) => {
                assert_eq!(record.request_id, "7");
                assert_eq!(record.hop, 2);
                assert_eq!(record.response.http_version, "HTTP/2.0");
                assert_eq!(record.response.content.size, 512);
                assert_eq!(record.server_ip_address.as_deref(), Some("93.184.216.34"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn timings_follow_resource_timing_phases() {
        let timing = ResourceTiming {
            request_time: 100.0,
            dns_start: 1.0,
            dns_end: 5.0,
            connect_start: 5.0,
            connect_end: 20.0,
            ssl_start: 10.0,
            ssl_end: 20.0,
            send_start: 21.0,
            send_end: 22.0,
            receive_headers_end: 72.0,
        };
        let timings = har_timings(&timing);
        assert_eq!(timings.blocked, 1.0);
        assert_eq!(timings.dns, 4.0);
        assert_eq!(timings.connect, 15.0);
        assert_eq!(timings.ssl, 10.0);
        assert_eq!(timings.send, 1.0);
        assert_eq!(timings.wait, 50.0);
    }

    #[test]
    fn reused_connection_reports_missing_phases() {
        let timing = ResourceTiming {
            request_time: 100.0,
            dns_start: -1.0,
            dns_end: -1.0,
            connect_start: -1.0,
            connect_end: -1.0,
            ssl_start: -1.0,
            ssl_end: -1.0,
            send_start: 0.5,
            send_end: 0.7,
            receive_headers_end: 10.7,
        };
        let timings = har_timings(&timing);
        assert_eq!(timings.dns, -1.0);
        assert_eq!(timings.connect, -1.0);
        assert_eq!(timings.blocked, 0.5);
    }

    #[test]
    fn http_version_mapping() {
        assert_eq!(http_version(Some("http/1.1")), "HTTP/1.1");
        assert_eq!(http_version(Some("h3-29")), "HTTP/3.0");
        assert_eq!(http_version(None), "");
    }
}

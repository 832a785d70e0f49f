use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Raw header map as delivered by the DevTools protocol. Values are either a
/// scalar or a list of scalars.
pub type Headers = serde_json::Map<String, serde_json::Value>;

/// Resource type of a network request. Only the top-level document matters
/// for capture, everything else is a sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Other,
}

impl ResourceType {
    pub fn is_document(self) -> bool {
        matches!(self, ResourceType::Document)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("document") {
            ResourceType::Document
        } else {
            ResourceType::Other
        }
    }
}

/// Network and lifecycle notifications emitted by a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkEvent {
    RequestWillBeSent(RequestWillBeSent),
    ResponseReceived(ResponseReceived),
    Lifecycle(LifecycleEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWillBeSent {
    pub request_id: String,
    pub loader_id: String,
    pub resource_type: ResourceType,
    /// Monotonic clock, seconds.
    pub timestamp: f64,
    /// Seconds since the UNIX epoch.
    pub wall_time: f64,
    pub request: RequestInfo,
    /// Response of the previous hop when this request follows a redirect.
    #[serde(default)]
    pub redirect_response: Option<ResponseInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseReceived {
    pub request_id: String,
    pub loader_id: String,
    pub resource_type: ResourceType,
    pub timestamp: f64,
    pub response: ResponseInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub url: String,
    pub status: i64,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub encoded_data_length: f64,
    #[serde(default)]
    pub remote_ip_address: Option<String>,
    #[serde(default)]
    pub timing: Option<ResourceTiming>,
}

/// Connection timing as reported by the browser. `request_time` is a
/// monotonic timestamp in seconds, every other field is milliseconds relative
/// to it, `-1` when the phase did not happen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceTiming {
    pub request_time: f64,
    pub dns_start: f64,
    pub dns_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub ssl_start: f64,
    pub ssl_end: f64,
    pub send_start: f64,
    pub send_end: f64,
    pub receive_headers_end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub name: String,
    pub loader_id: String,
    pub timestamp: f64,
}

/// Format a wall-clock timestamp (seconds since epoch) as RFC 3339 with
/// nanosecond precision. Out of range values collapse to the epoch.
pub fn format_wall_time(wall_time: f64) -> String {
    let secs = wall_time.trunc() as i64;
    let nanos = ((wall_time.fract() * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

//! Translation of chromiumoxide protocol events into capture events.

use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, Headers as CdpHeaders,
    ResourceTiming as CdpResourceTiming, ResourceType as CdpResourceType, Response,
};
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use harcap_engine::event::{
    Headers, LifecycleEvent, NetworkEvent, RequestInfo, RequestWillBeSent, ResourceTiming,
    ResourceType, ResponseInfo, ResponseReceived,
};

pub(crate) fn request_event(event: &EventRequestWillBeSent) -> NetworkEvent {
    NetworkEvent::RequestWillBeSent(RequestWillBeSent {
        request_id: event.request_id.inner().clone(),
        loader_id: event.loader_id.inner().clone(),
        resource_type: resource_type(event.r#type.as_ref()),
        timestamp: *event.timestamp.inner(),
        wall_time: *event.wall_time.inner(),
        request: RequestInfo {
            method: event.request.method.clone(),
            url: event.request.url.clone(),
            headers: headers(&event.request.headers),
        },
        redirect_response: event.redirect_response.as_ref().map(response_info),
    })
}

pub(crate) fn response_event(event: &EventResponseReceived) -> NetworkEvent {
    NetworkEvent::ResponseReceived(ResponseReceived {
        request_id: event.request_id.inner().clone(),
        loader_id: event.loader_id.inner().clone(),
        resource_type: resource_type(Some(&event.r#type)),
        timestamp: *event.timestamp.inner(),
        response: response_info(&event.response),
    })
}

pub(crate) fn lifecycle_event(event: &EventLifecycleEvent) -> NetworkEvent {
    NetworkEvent::Lifecycle(LifecycleEvent {
        name: event.name.clone(),
        loader_id: event.loader_id.inner().clone(),
        timestamp: *event.timestamp.inner(),
    })
}

fn resource_type(resource_type: Option<&CdpResourceType>) -> ResourceType {
    match resource_type {
        Some(CdpResourceType::Document) => ResourceType::Document,
        _ => ResourceType::Other,
    }
}

fn headers(headers: &CdpHeaders) -> Headers {
    match headers.inner() {
        serde_json::Value::Object(map) => map.clone(),
        _ => Headers::new(),
    }
}

fn response_info(response: &Response) -> ResponseInfo {
    ResponseInfo {
        url: response.url.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        protocol: response.protocol.clone(),
        mime_type: response.mime_type.clone(),
        headers: headers(&response.headers),
        encoded_data_length: response.encoded_data_length,
        remote_ip_address: response.remote_ip_address.clone(),
        timing: response.timing.as_ref().map(resource_timing),
    }
}

fn resource_timing(timing: &CdpResourceTiming) -> ResourceTiming {
    ResourceTiming {
        request_time: timing.request_time,
        dns_start: timing.dns_start,
        dns_end: timing.dns_end,
        connect_start: timing.connect_start,
        connect_end: timing.connect_end,
        ssl_start: timing.ssl_start,
        ssl_end: timing.ssl_end,
        send_start: timing.send_start,
        send_end: timing.send_end,
        receive_headers_end: timing.receive_headers_end,
    }
}

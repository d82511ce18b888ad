//! Flat side-channel network messages from the inspector agent.
//!
//! Unlike timeline records these carry their own `time` field and no
//! children. On the wire `time` is in source-clock seconds; after the proxy
//! normalizes a message it holds milliseconds relative to the base time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{RecordKind, ResourceId};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InspectorKind {
    WillSendRequest,
    DidReceiveResponse,
    DidReceiveContentLength,
}

impl InspectorKind {
    pub fn record_kind(self) -> RecordKind {
        match self {
            InspectorKind::WillSendRequest => RecordKind::InspectorWillSendRequest,
            InspectorKind::DidReceiveResponse => RecordKind::InspectorDidReceiveResponse,
            InspectorKind::DidReceiveContentLength => {
                RecordKind::InspectorDidReceiveContentLength
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WillSendRequest {
    pub identifier: ResourceId,
    pub time: f64,
    pub url: String,
    #[serde(default)]
    pub request_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidReceiveResponse {
    pub identifier: ResourceId,
    pub time: f64,
    pub response: NetworkResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
    pub url: String,
    pub http_status_code: u16,
    #[serde(default)]
    pub http_status_text: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub was_cached: bool,
    #[serde(rename = "connectionID", default)]
    pub connection_id: u64,
    #[serde(default)]
    pub connection_reused: bool,
    #[serde(rename = "httpHeaderFields", default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timing: Option<DetailedTiming>,
}

/// Per-phase connection timing. `request_time` is an absolute source-clock
/// stamp in seconds (normalized by the proxy); the remaining fields are
/// millisecond offsets from it, `-1` when a phase did not occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedTiming {
    pub request_time: f64,
    #[serde(default = "absent_phase")]
    pub proxy_start: f64,
    #[serde(default = "absent_phase")]
    pub proxy_end: f64,
    #[serde(default = "absent_phase")]
    pub dns_start: f64,
    #[serde(default = "absent_phase")]
    pub dns_end: f64,
    #[serde(default = "absent_phase")]
    pub connect_start: f64,
    #[serde(default = "absent_phase")]
    pub connect_end: f64,
    #[serde(default = "absent_phase")]
    pub send_start: f64,
    #[serde(default = "absent_phase")]
    pub send_end: f64,
    #[serde(default = "absent_phase")]
    pub receive_headers_end: f64,
}

fn absent_phase() -> f64 {
    -1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidReceiveContentLength {
    pub identifier: ResourceId,
    pub time: f64,
    pub length_received: u64,
}

/// One of the three inspector message payloads, carried inside a forwarded
/// [`crate::EventRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum InspectorData {
    WillSendRequest(WillSendRequest),
    DidReceiveResponse(DidReceiveResponse),
    DidReceiveContentLength(DidReceiveContentLength),
}

impl InspectorData {
    pub fn kind(&self) -> InspectorKind {
        match self {
            InspectorData::WillSendRequest(_) => InspectorKind::WillSendRequest,
            InspectorData::DidReceiveResponse(_) => InspectorKind::DidReceiveResponse,
            InspectorData::DidReceiveContentLength(_) => InspectorKind::DidReceiveContentLength,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            InspectorData::WillSendRequest(data) => data.time,
            InspectorData::DidReceiveResponse(data) => data.time,
            InspectorData::DidReceiveContentLength(data) => data.time,
        }
    }

    pub fn set_time(&mut self, time: f64) {
        match self {
            InspectorData::WillSendRequest(data) => data.time = time,
            InspectorData::DidReceiveResponse(data) => data.time = time,
            InspectorData::DidReceiveContentLength(data) => data.time = time,
        }
    }

    pub fn identifier(&self) -> ResourceId {
        match self {
            InspectorData::WillSendRequest(data) => data.identifier,
            InspectorData::DidReceiveResponse(data) => data.identifier,
            InspectorData::DidReceiveContentLength(data) => data.identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parses_the_full_wire_shape() {
        let body = json!({
            "identifier": 5,
            "time": 1.75,
            "response": {
                "url": "http://example.com/",
                "httpStatusCode": 200,
                "httpStatusText": "OK",
                "mimeType": "text/html",
                "wasCached": false,
                "connectionID": 91,
                "connectionReused": true,
                "httpHeaderFields": { "Content-Type": "text/html" },
                "timing": { "requestTime": 1.7, "dnsStart": 0.0, "dnsEnd": 2.0 }
            }
        });

        let parsed: DidReceiveResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.identifier, ResourceId(5));
        assert_eq!(parsed.response.connection_id, 91);
        assert!(parsed.response.connection_reused);
        let timing = parsed.response.timing.unwrap();
        assert_eq!(timing.request_time, 1.7);
        assert_eq!(timing.dns_end, 2.0);
        assert_eq!(timing.proxy_start, -1.0);
    }

    #[test]
    fn timing_is_optional() {
        let body = json!({
            "identifier": 2,
            "time": 0.5,
            "response": { "url": "http://a/", "httpStatusCode": 304 }
        });
        let parsed: DidReceiveResponse = serde_json::from_value(body).unwrap();
        assert!(parsed.response.timing.is_none());
        assert!(parsed.response.headers.is_empty());
    }
}

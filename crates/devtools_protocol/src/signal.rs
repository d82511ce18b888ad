use serde_json::Value;

use crate::error::SignalError;
use crate::inspector::{DidReceiveContentLength, DidReceiveResponse, WillSendRequest};
use crate::record::RawRecord;

/// The closed set of inbound page-event signals.
///
/// The capture source delivers `(method, body)` pairs; [`PageSignal::from_wire`]
/// validates the body against the shape the method implies, exactly once.
/// Methods outside this set are not an error, they are simply not ours.
#[derive(Debug, Clone, PartialEq)]
pub enum PageSignal {
    AddRecordToTimeline(RawRecord),
    WillSendRequest(WillSendRequest),
    DidReceiveResponse(DidReceiveResponse),
    DidReceiveContentLength(DidReceiveContentLength),
    FrontendReused,
}

impl PageSignal {
    /// Parses a wire signal. `Ok(None)` means the method is unrecognized and
    /// the event should be ignored.
    pub fn from_wire(method: &str, body: &Value) -> Result<Option<PageSignal>, SignalError> {
        let signal = match method {
            "addRecordToTimeline" => {
                let record = body.get("record").ok_or(SignalError::MissingRecord)?;
                PageSignal::AddRecordToTimeline(RawRecord::from_wire(record)?)
            }
            "willSendRequest" => PageSignal::WillSendRequest(parse("willSendRequest", body)?),
            "didReceiveResponse" => {
                PageSignal::DidReceiveResponse(parse("didReceiveResponse", body)?)
            }
            "didReceiveContentLength" => {
                PageSignal::DidReceiveContentLength(parse("didReceiveContentLength", body)?)
            }
            "frontendReused" => PageSignal::FrontendReused,
            _ => return Ok(None),
        };
        Ok(Some(signal))
    }

    pub fn method(&self) -> &'static str {
        match self {
            PageSignal::AddRecordToTimeline(_) => "addRecordToTimeline",
            PageSignal::WillSendRequest(_) => "willSendRequest",
            PageSignal::DidReceiveResponse(_) => "didReceiveResponse",
            PageSignal::DidReceiveContentLength(_) => "didReceiveContentLength",
            PageSignal::FrontendReused => "frontendReused",
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    method: &'static str,
    body: &Value,
) -> Result<T, SignalError> {
    serde_json::from_value(body.clone()).map_err(|source| SignalError::Payload { method, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordKind, ResourceId};
    use serde_json::json;

    #[test]
    fn unrecognized_methods_are_not_errors() {
        assert!(PageSignal::from_wire("somethingElse", &json!({}))
            .unwrap()
            .is_none());
    }

    #[test]
    fn frontend_reused_has_no_payload() {
        let signal = PageSignal::from_wire("frontendReused", &Value::Null)
            .unwrap()
            .unwrap();
        assert_eq!(signal, PageSignal::FrontendReused);
    }

    #[test]
    fn timeline_signal_unwraps_the_record_field() {
        let body = json!({
            "record": { "type": 3, "startTime": 1.0, "data": {} }
        });
        let signal = PageSignal::from_wire("addRecordToTimeline", &body)
            .unwrap()
            .unwrap();
        let PageSignal::AddRecordToTimeline(record) = signal else {
            panic!("expected a timeline record");
        };
        assert_eq!(record.kind, Some(RecordKind::Paint));
    }

    #[test]
    fn missing_record_field_is_a_parse_error() {
        let err = PageSignal::from_wire("addRecordToTimeline", &json!({})).unwrap_err();
        assert!(matches!(err, SignalError::MissingRecord));
    }

    #[test]
    fn inspector_payloads_parse_to_typed_data() {
        let body = json!({
            "identifier": 4,
            "time": 2.5,
            "url": "http://example.com/app.js",
            "requestMethod": "GET"
        });
        let signal = PageSignal::from_wire("willSendRequest", &body)
            .unwrap()
            .unwrap();
        let PageSignal::WillSendRequest(data) = signal else {
            panic!("expected willSendRequest");
        };
        assert_eq!(data.identifier, ResourceId(4));
        assert_eq!(data.request_method.as_deref(), Some("GET"));
    }

    #[test]
    fn malformed_inspector_payload_is_a_parse_error() {
        let err = PageSignal::from_wire("didReceiveContentLength", &json!({ "time": 1.0 }))
            .unwrap_err();
        assert!(matches!(err, SignalError::Payload { method, .. } if method == "didReceiveContentLength"));
    }
}

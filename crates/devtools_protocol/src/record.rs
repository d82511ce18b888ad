use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RecordError;

/// Opaque identifier the capture source assigns to one logical resource
/// request. Recycled across the redirect hops of a single request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Timeline and inspector record kinds, tagged on the wire with a `u32` code.
///
/// `TabChanged` never arrives from the capture source; it is synthesized when
/// a main-frame navigation is detected. Codes this crate does not know map to
/// `Unknown` and are forwarded untouched rather than rejected.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordKind {
    DomEvent,
    Layout,
    RecalcStyle,
    Paint,
    ParseHtml,
    TimerInstalled,
    TimerCleared,
    TimerFired,
    XhrReadyStateChange,
    XhrLoad,
    EvalScript,
    LogMessage,
    ResourceSendRequest,
    ResourceReceiveResponse,
    ResourceFinish,
    GarbageCollect,
    TabChanged,
    InspectorWillSendRequest,
    InspectorDidReceiveResponse,
    InspectorDidReceiveContentLength,
    Unknown,
}

impl RecordKind {
    pub fn from_wire_code(code: u32) -> RecordKind {
        match code {
            0 => RecordKind::DomEvent,
            1 => RecordKind::Layout,
            2 => RecordKind::RecalcStyle,
            3 => RecordKind::Paint,
            4 => RecordKind::ParseHtml,
            5 => RecordKind::TimerInstalled,
            6 => RecordKind::TimerCleared,
            7 => RecordKind::TimerFired,
            8 => RecordKind::XhrReadyStateChange,
            9 => RecordKind::XhrLoad,
            10 => RecordKind::EvalScript,
            11 => RecordKind::LogMessage,
            12 => RecordKind::ResourceSendRequest,
            13 => RecordKind::ResourceReceiveResponse,
            14 => RecordKind::ResourceFinish,
            15 => RecordKind::GarbageCollect,
            16 => RecordKind::TabChanged,
            17 => RecordKind::InspectorWillSendRequest,
            18 => RecordKind::InspectorDidReceiveResponse,
            19 => RecordKind::InspectorDidReceiveContentLength,
            _ => RecordKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStartData {
    pub identifier: ResourceId,
    pub url: String,
    #[serde(default)]
    pub request_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponseData {
    pub identifier: ResourceId,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFinishData {
    pub identifier: ResourceId,
    #[serde(default)]
    pub did_fail: bool,
}

/// Record payload, validated once when the signal crosses the boundary.
///
/// Network lifecycle records get dedicated shapes; every other timeline kind
/// keeps its raw body under `Generic` since the proxy never reads it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    ResourceStart(ResourceStartData),
    ResourceResponse(ResourceResponseData),
    ResourceFinish(ResourceFinishData),
    /// Synthesized navigation marker; never parsed from the wire.
    TabChange { url: String },
    Inspector(crate::InspectorData),
    Generic(Value),
}

impl RecordPayload {
    pub fn is_resource_start(&self) -> bool {
        matches!(self, RecordPayload::ResourceStart(_))
    }
}

/// A tree-shaped record as delivered by the capture source: times on the
/// source clock in seconds, kind possibly unresolved until
/// [`RawRecord::ensure_kinds`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: Option<RecordKind>,
    /// Source-clock start time, in seconds.
    pub start_time: f64,
    pub payload: RecordPayload,
    pub children: Vec<RawRecord>,
}

/// The normalized counterpart of [`RawRecord`]: `time` is in milliseconds
/// relative to the session base time.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub kind: RecordKind,
    /// Milliseconds since the session base time.
    pub time: f64,
    pub payload: RecordPayload,
    pub children: Vec<EventRecord>,
}

/// Converts a source-clock timestamp to milliseconds relative to the base
/// time. The single formula every normalized time goes through.
pub fn normalize_seconds(seconds: f64, base_time_ms: f64) -> f64 {
    seconds * 1000.0 - base_time_ms
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    #[serde(rename = "type")]
    kind: Option<u32>,
    start_time: f64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    children: Vec<WireRecord>,
}

impl RawRecord {
    /// Parses a timeline record tree from its wire body.
    pub fn from_wire(body: &Value) -> Result<RawRecord, RecordError> {
        let wire: WireRecord =
            serde_json::from_value(body.clone()).map_err(RecordError::Shape)?;
        RawRecord::from_wire_record(wire)
    }

    fn from_wire_record(wire: WireRecord) -> Result<RawRecord, RecordError> {
        let kind = wire.kind.map(RecordKind::from_wire_code);
        let payload = match kind {
            Some(resolved) => typed_payload(resolved, wire.data)?,
            None => RecordPayload::Generic(wire.data),
        };
        let children = wire
            .children
            .into_iter()
            .map(RawRecord::from_wire_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawRecord {
            kind,
            start_time: wire.start_time,
            payload,
            children,
        })
    }

    /// The synthesized navigation record for a main-frame resource start.
    pub fn tab_change(start_time: f64, url: String) -> RawRecord {
        RawRecord {
            kind: Some(RecordKind::TabChanged),
            start_time,
            payload: RecordPayload::TabChange { url },
            children: Vec::new(),
        }
    }

    /// Visits every node exactly once, children before parent.
    pub fn visit_leaf_first<F: FnMut(&mut RawRecord)>(&mut self, action: &mut F) {
        for child in &mut self.children {
            child.visit_leaf_first(action);
        }
        action(self);
    }

    /// Resolves the kind of every node whose producer omitted the type tag.
    ///
    /// Network records nested inside a trace arrive without a code; their
    /// kind is derived from the payload shape. Anything underivable becomes
    /// `Unknown` with its raw body preserved.
    pub fn ensure_kinds(&mut self) {
        self.visit_leaf_first(&mut |node| {
            if node.kind.is_some() {
                return;
            }
            let RecordPayload::Generic(data) = &node.payload else {
                return;
            };
            if let Some((kind, payload)) = derive_from_shape(data) {
                node.kind = Some(kind);
                node.payload = payload;
            } else {
                node.kind = Some(RecordKind::Unknown);
            }
        });
    }

    /// Consumes the raw tree and produces its normalized counterpart,
    /// children first. Pure: no aliasing with the input survives.
    pub fn normalize(self, base_time_ms: f64) -> EventRecord {
        let children = self
            .children
            .into_iter()
            .map(|child| child.normalize(base_time_ms))
            .collect();
        EventRecord {
            kind: self.kind.unwrap_or(RecordKind::Unknown),
            time: normalize_seconds(self.start_time, base_time_ms),
            payload: self.payload,
            children,
        }
    }
}

fn typed_payload(kind: RecordKind, data: Value) -> Result<RecordPayload, RecordError> {
    match kind {
        RecordKind::ResourceSendRequest => serde_json::from_value(data)
            .map(RecordPayload::ResourceStart)
            .map_err(|source| RecordError::Payload { kind, source }),
        RecordKind::ResourceReceiveResponse => serde_json::from_value(data)
            .map(RecordPayload::ResourceResponse)
            .map_err(|source| RecordError::Payload { kind, source }),
        RecordKind::ResourceFinish => serde_json::from_value(data)
            .map(RecordPayload::ResourceFinish)
            .map_err(|source| RecordError::Payload { kind, source }),
        _ => Ok(RecordPayload::Generic(data)),
    }
}

fn derive_from_shape(data: &Value) -> Option<(RecordKind, RecordPayload)> {
    let object = data.as_object()?;
    if !object.contains_key("identifier") {
        return None;
    }
    if object.contains_key("url") {
        let parsed = serde_json::from_value(data.clone()).ok()?;
        return Some((
            RecordKind::ResourceSendRequest,
            RecordPayload::ResourceStart(parsed),
        ));
    }
    if object.contains_key("statusCode") || object.contains_key("mimeType") {
        let parsed = serde_json::from_value(data.clone()).ok()?;
        return Some((
            RecordKind::ResourceReceiveResponse,
            RecordPayload::ResourceResponse(parsed),
        ));
    }
    if object.contains_key("didFail") {
        let parsed = serde_json::from_value(data.clone()).ok()?;
        return Some((
            RecordKind::ResourceFinish,
            RecordPayload::ResourceFinish(parsed),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(start_time: f64) -> RawRecord {
        RawRecord {
            kind: Some(RecordKind::Paint),
            start_time,
            payload: RecordPayload::Generic(Value::Null),
            children: Vec::new(),
        }
    }

    #[test]
    fn traversal_visits_children_before_parents() {
        let mut root = RawRecord {
            kind: Some(RecordKind::DomEvent),
            start_time: 3.0,
            payload: RecordPayload::Generic(Value::Null),
            children: vec![
                RawRecord {
                    children: vec![leaf(1.0)],
                    ..leaf(2.0)
                },
                leaf(4.0),
            ],
        };

        let mut order = Vec::new();
        root.visit_leaf_first(&mut |node| order.push(node.start_time));
        assert_eq!(order, vec![1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn normalize_converts_every_node_to_millis_relative_to_base() {
        let root = RawRecord {
            kind: Some(RecordKind::DomEvent),
            start_time: 1.5,
            payload: RecordPayload::Generic(Value::Null),
            children: vec![leaf(1.25)],
        };

        let normalized = root.normalize(1000.0);
        assert_eq!(normalized.time, 500.0);
        assert_eq!(normalized.children[0].time, 250.0);
        assert_eq!(normalized.kind, RecordKind::DomEvent);
    }

    #[test]
    fn ensure_kinds_derives_untagged_network_records() {
        let body = json!({
            "startTime": 2.0,
            "data": { "foo": 1 },
            "children": [
                {
                    "startTime": 2.1,
                    "data": { "identifier": 7, "url": "http://a/" }
                },
                {
                    "startTime": 2.2,
                    "data": { "identifier": 7, "statusCode": 200, "mimeType": "text/html" }
                }
            ]
        });

        let mut record = RawRecord::from_wire(&body).unwrap();
        assert_eq!(record.kind, None);
        record.ensure_kinds();

        assert_eq!(record.kind, Some(RecordKind::Unknown));
        assert_eq!(record.children[0].kind, Some(RecordKind::ResourceSendRequest));
        assert!(record.children[0].payload.is_resource_start());
        assert_eq!(
            record.children[1].kind,
            Some(RecordKind::ResourceReceiveResponse)
        );
    }

    #[test]
    fn unknown_wire_code_is_tolerated() {
        let body = json!({ "type": 9000, "startTime": 0.5, "data": { "x": true } });
        let record = RawRecord::from_wire(&body).unwrap();
        assert_eq!(record.kind, Some(RecordKind::Unknown));
        assert!(matches!(record.payload, RecordPayload::Generic(_)));
    }

    #[test]
    fn malformed_network_payload_is_rejected_at_the_boundary() {
        let body = json!({ "type": 12, "startTime": 0.5, "data": { "url": "http://a/" } });
        let err = RawRecord::from_wire(&body).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Payload {
                kind: RecordKind::ResourceSendRequest,
                ..
            }
        ));
    }
}

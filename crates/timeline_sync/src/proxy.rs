use devtools_protocol::{
    normalize_seconds, DidReceiveContentLength, DidReceiveResponse, EventRecord, InspectorData,
    RawRecord, RecordPayload, ResourceId, WillSendRequest,
};
use tracing::debug;

use crate::sink::EventSink;

/// The resource start currently treated as the page-defining navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPage {
    pub identifier: ResourceId,
    pub url: String,
}

/// Normalizes the push stream from one monitored tab into a strictly
/// non-negative, time-aligned record stream for a downstream sink.
///
/// The proxy starts without a time origin. Resource starts that arrive before
/// the origin exists are buffered; the first non-start timeline record fixes
/// the base time at the minimum of its own start and every buffered start,
/// after which the buffer is replayed in arrival order and the proxy stays
/// synchronized until [`TimelineNormalizer::reset`].
pub struct TimelineNormalizer<S> {
    /// Session time origin in milliseconds, `None` while awaiting.
    base_time: Option<f64>,
    current_page: Option<CurrentPage>,
    pending: Vec<RawRecord>,
    next_resource_is_main: bool,
    sink: S,
}

impl<S: EventSink> TimelineNormalizer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            base_time: None,
            current_page: None,
            pending: Vec::new(),
            next_resource_is_main: false,
            sink,
        }
    }

    pub fn base_time(&self) -> Option<f64> {
        self.base_time
    }

    /// Overrides the time origin. A negative value re-enters the awaiting
    /// state, so subsequent records buffer or establish a fresh origin.
    pub fn set_base_time(&mut self, base_time_ms: f64) {
        self.base_time = (base_time_ms >= 0.0).then_some(base_time_ms);
    }

    pub fn is_synchronized(&self) -> bool {
        self.base_time.is_some()
    }

    pub fn current_page(&self) -> Option<&CurrentPage> {
        self.current_page.as_ref()
    }

    /// Returns the session to its initial state: origin unset, buffer and
    /// page tracking cleared.
    pub fn reset(&mut self) {
        self.base_time = None;
        self.pending.clear();
        self.current_page = None;
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Flags the next resource start as the main (page-defining) resource.
    /// Consumed by the first start that reaches the transition check.
    pub fn on_frontend_reused(&mut self) {
        self.next_resource_is_main = true;
    }

    /// Primary entry point for tree-shaped timeline records.
    pub fn on_timeline_record(&mut self, mut record: RawRecord) {
        record.ensure_kinds();

        if self.base_time.is_none() {
            // A resource start may have happened inside a larger event trace;
            // trusting it as the origin would push short-circuited network
            // events negative. Hold starts until a non-start record arrives.
            if record.payload.is_resource_start() {
                self.pending.push(record);
                return;
            }

            self.establish_base_time(&record);
            for buffered in std::mem::take(&mut self.pending) {
                self.dispatch_synchronized(buffered);
            }
        }

        self.dispatch_synchronized(record);
    }

    pub fn on_will_send_request(&mut self, data: WillSendRequest) {
        self.forward_inspector(InspectorData::WillSendRequest(data));
    }

    pub fn on_did_receive_response(&mut self, mut data: DidReceiveResponse) {
        if let Some(base) = self.base_time {
            if let Some(timing) = data.response.timing.as_mut() {
                timing.request_time = normalize_seconds(timing.request_time, base);
            }
        }
        self.forward_inspector(InspectorData::DidReceiveResponse(data));
    }

    pub fn on_did_receive_content_length(&mut self, data: DidReceiveContentLength) {
        self.forward_inspector(InspectorData::DidReceiveContentLength(data));
    }

    /// Fixes the time origin from the trigger record and everything buffered
    /// ahead of it. The origin is the earliest start observed so the replayed
    /// buffer normalizes to non-negative times.
    fn establish_base_time(&mut self, trigger: &RawRecord) {
        debug_assert!(self.base_time.is_none(), "base time established twice");

        let mut origin = trigger.start_time;
        for buffered in &self.pending {
            if buffered.start_time < origin {
                origin = buffered.start_time;
            }
        }
        self.base_time = Some(origin * 1000.0);
    }

    fn dispatch_synchronized(&mut self, record: RawRecord) {
        match &record.payload {
            RecordPayload::ResourceStart(start) => {
                if self.next_resource_is_main {
                    self.next_resource_is_main = false;
                    // Redirects recycle the identifier; a matching id means
                    // this start is another hop of the current navigation,
                    // not a new page.
                    let is_redirect = self
                        .current_page
                        .as_ref()
                        .is_some_and(|page| page.identifier == start.identifier);
                    if !is_redirect {
                        self.current_page = Some(CurrentPage {
                            identifier: start.identifier,
                            url: start.url.clone(),
                        });
                        let transition = RawRecord::tab_change(record.start_time, start.url.clone());
                        self.normalize_and_forward(transition);
                    }
                }
            }
            RecordPayload::ResourceResponse(_) => {
                // Any response re-arms the next transition, so a page with no
                // redirect still fires its transition.
                self.current_page = None;
            }
            _ => {}
        }

        self.normalize_and_forward(record);
    }

    fn normalize_and_forward(&mut self, record: RawRecord) {
        let Some(base) = self.base_time else {
            debug_assert!(false, "normalization attempted before the base time exists");
            return;
        };
        self.forward(record.normalize(base));
    }

    fn forward(&mut self, record: EventRecord) {
        debug_assert!(record.time.is_finite(), "record time was not normalized");

        // The capture source occasionally stamps a record before the session
        // origin; forwarding it would hand the consumer a negative timestamp.
        if record.time < 0.0 {
            debug!(kind = ?record.kind, time = record.time, "dropping record stamped before base time");
            return;
        }
        self.sink.on_event(record);
    }

    fn forward_inspector(&mut self, mut data: InspectorData) {
        // Only timeline records may establish the base time. Inspector
        // messages arriving earlier are dropped, never buffered.
        let Some(base) = self.base_time else {
            debug!(kind = ?data.kind(), "dropping inspector message before base time");
            return;
        };

        data.set_time(normalize_seconds(data.time(), base));
        let record = EventRecord {
            kind: data.kind().record_kind(),
            time: data.time(),
            payload: RecordPayload::Inspector(data),
            children: Vec::new(),
        };
        self.forward(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_protocol::{RecordKind, ResourceStartData};
    use serde_json::Value;

    fn normalizer() -> TimelineNormalizer<Vec<EventRecord>> {
        TimelineNormalizer::new(Vec::new())
    }

    fn resource_start(identifier: u64, url: &str, start_time: f64) -> RawRecord {
        RawRecord {
            kind: Some(RecordKind::ResourceSendRequest),
            start_time,
            payload: RecordPayload::ResourceStart(ResourceStartData {
                identifier: ResourceId(identifier),
                url: url.to_string(),
                request_method: None,
            }),
            children: Vec::new(),
        }
    }

    fn paint(start_time: f64) -> RawRecord {
        RawRecord {
            kind: Some(RecordKind::Paint),
            start_time,
            payload: RecordPayload::Generic(Value::Null),
            children: Vec::new(),
        }
    }

    #[test]
    fn starts_buffer_until_a_non_start_record_arrives() {
        let mut proxy = normalizer();
        proxy.on_timeline_record(resource_start(1, "http://a/", 1.0));
        assert!(!proxy.is_synchronized());
        assert!(proxy.sink_mut().is_empty());

        proxy.on_timeline_record(paint(1.5));
        assert_eq!(proxy.base_time(), Some(1000.0));
        assert_eq!(proxy.sink_mut().len(), 2);
    }

    #[test]
    fn negative_normalized_times_are_dropped() {
        let mut proxy = normalizer();
        proxy.set_base_time(2000.0);
        proxy.on_timeline_record(paint(1.0));
        assert!(proxy.sink_mut().is_empty());

        proxy.on_timeline_record(paint(3.0));
        assert_eq!(proxy.sink_mut().len(), 1);
        assert_eq!(proxy.sink_mut()[0].time, 1000.0);
    }

    #[test]
    fn negative_base_time_re_enters_the_awaiting_state() {
        let mut proxy = normalizer();
        proxy.set_base_time(500.0);
        assert!(proxy.is_synchronized());

        proxy.set_base_time(-1.0);
        assert!(!proxy.is_synchronized());
        proxy.on_timeline_record(resource_start(1, "http://a/", 1.0));
        assert!(proxy.sink_mut().is_empty());
    }

    #[test]
    fn response_timing_request_time_is_normalized_too() {
        let body = serde_json::json!({
            "identifier": 5,
            "time": 2.0,
            "response": {
                "url": "http://a/",
                "httpStatusCode": 200,
                "timing": { "requestTime": 1.9 }
            }
        });
        let data: DidReceiveResponse = serde_json::from_value(body).unwrap();

        let mut proxy = normalizer();
        proxy.set_base_time(1000.0);
        proxy.on_did_receive_response(data);

        let record = &proxy.sink_mut()[0];
        assert_eq!(record.time, 1000.0);
        let RecordPayload::Inspector(InspectorData::DidReceiveResponse(data)) = &record.payload
        else {
            panic!("expected a response payload");
        };
        assert_eq!(data.response.timing.as_ref().unwrap().request_time, 900.0);
    }

    #[test]
    fn reset_clears_origin_buffer_and_page() {
        let mut proxy = normalizer();
        proxy.on_frontend_reused();
        proxy.on_timeline_record(resource_start(1, "http://a/", 1.0));
        proxy.on_timeline_record(paint(1.2));
        assert!(proxy.current_page().is_some());

        proxy.reset();
        assert!(!proxy.is_synchronized());
        assert!(proxy.current_page().is_none());

        // A start arriving after the reset buffers again instead of flowing.
        let before = proxy.sink_mut().len();
        proxy.on_timeline_record(resource_start(2, "http://b/", 5.0));
        assert_eq!(proxy.sink_mut().len(), before);
    }
}

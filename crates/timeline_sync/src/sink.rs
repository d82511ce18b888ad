use devtools_protocol::EventRecord;

/// Downstream consumer of normalized records.
///
/// The proxy guarantees every record delivered here has a finite,
/// non-negative `time`.
pub trait EventSink {
    fn on_event(&mut self, record: EventRecord);
}

impl EventSink for Vec<EventRecord> {
    fn on_event(&mut self, record: EventRecord) {
        self.push(record);
    }
}

use std::fmt;

use devtools_protocol::PageSignal;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::proxy::TimelineNormalizer;
use crate::sink::EventSink;

/// Browser tab being monitored.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Capture toggles forwarded verbatim to the capture source.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ProfilingOptions {
    pub enable_stack_traces: bool,
    pub enable_cpu_profiling: bool,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to attach to page events for tab {tab}: {reason}")]
    Attach { tab: TabId, reason: String },
}

/// The external capture source, at its interface: page-event subscription
/// per tab plus the profiling-options passthrough. Implementations deliver
/// events by calling [`TabMonitor::dispatch`] on the subscribed session.
pub trait CaptureSource {
    fn subscribe(&mut self, tab: TabId) -> Result<(), CaptureError>;
    fn unsubscribe(&mut self, tab: TabId);
    fn set_profiling_options(&mut self, tab: TabId, options: ProfilingOptions);
}

/// One monitoring session for one tab.
///
/// Owns the proxy state for the session's lifetime. `connect`, `disconnect`
/// and the stop/resume pair are idempotent; stop/resume preserves accumulated
/// state while [`TabMonitor::unload`] resets it.
pub struct TabMonitor<C: CaptureSource, S: EventSink> {
    tab: TabId,
    source: C,
    connected: bool,
    proxy: TimelineNormalizer<S>,
}

impl<C: CaptureSource, S: EventSink> TabMonitor<C, S> {
    pub fn new(tab: TabId, source: C, sink: S) -> Self {
        Self {
            tab,
            source,
            connected: false,
            proxy: TimelineNormalizer::new(sink),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn proxy(&self) -> &TimelineNormalizer<S> {
        &self.proxy
    }

    pub fn proxy_mut(&mut self) -> &mut TimelineNormalizer<S> {
        &mut self.proxy
    }

    pub fn into_sink(self) -> S {
        self.proxy.into_sink()
    }

    /// Attaches to the capture source. A failed attach means monitoring did
    /// not start; it is logged, not fatal.
    pub fn connect(&mut self) {
        // The source does not tolerate a second subscription for the same tab.
        if self.connected {
            return;
        }
        match self.source.subscribe(self.tab) {
            Ok(()) => self.connected = true,
            Err(error) => {
                warn!(tab = self.tab.0, %error, "could not attach to page events; monitoring not started");
            }
        }
    }

    /// Detaches from the capture source without touching accumulated state.
    /// After this returns no further signals are delivered.
    pub fn stop_monitoring(&mut self) {
        self.disconnect();
    }

    pub fn resume_monitoring(&mut self) {
        self.connect();
    }

    /// Ends the session: detaches and resets the proxy so a future connect
    /// starts from a fresh time origin.
    pub fn unload(&mut self) {
        self.proxy.reset();
        self.disconnect();
    }

    pub fn set_profiling_options(&mut self, enable_stack_traces: bool, enable_cpu_profiling: bool) {
        self.source.set_profiling_options(
            self.tab,
            ProfilingOptions {
                enable_stack_traces,
                enable_cpu_profiling,
            },
        );
    }

    /// Routes one inbound signal to its handler.
    pub fn dispatch(&mut self, signal: PageSignal) {
        if !self.connected {
            debug!(tab = self.tab.0, method = signal.method(), "ignoring signal for detached session");
            return;
        }
        match signal {
            PageSignal::AddRecordToTimeline(record) => self.proxy.on_timeline_record(record),
            PageSignal::WillSendRequest(data) => self.proxy.on_will_send_request(data),
            PageSignal::DidReceiveResponse(data) => self.proxy.on_did_receive_response(data),
            PageSignal::DidReceiveContentLength(data) => {
                self.proxy.on_did_receive_content_length(data)
            }
            PageSignal::FrontendReused => self.proxy.on_frontend_reused(),
        }
    }

    /// Boundary entry for raw `(method, body)` pairs. Unrecognized names and
    /// malformed payloads are protocol noise, not errors.
    pub fn dispatch_wire(&mut self, method: &str, body: &Value) {
        match PageSignal::from_wire(method, body) {
            Ok(Some(signal)) => self.dispatch(signal),
            Ok(None) => debug!(tab = self.tab.0, method, "ignoring unrecognized page event"),
            Err(error) => {
                debug!(tab = self.tab.0, method, %error, "ignoring malformed page event");
            }
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.source.unsubscribe(self.tab);
            self.connected = false;
        }
    }
}

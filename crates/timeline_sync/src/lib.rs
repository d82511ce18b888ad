#![forbid(unsafe_code)]
//! Normalization and synchronization proxy for a devtools page-event stream.
//!
//! The capture source is clock-skewed and partially buffered: records arrive
//! on its own clock, in seconds, and the stream has no declared time origin.
//! This crate establishes a single base time per monitoring session, buffers
//! resource starts that arrive before the origin exists, replays them in
//! arrival order once it does, synthesizes navigation transitions from the
//! resource lifecycle (redirect-aware), and forwards strictly non-negative,
//! millisecond-aligned [`devtools_protocol::EventRecord`]s to a downstream
//! sink.
//!
//! Entry points: [`TabMonitor`] for a full session (lifecycle + routing), or
//! [`TimelineNormalizer`] directly when the caller owns the listener plumbing.

mod proxy;
mod session;
mod sink;

#[cfg(feature = "tokio")]
pub mod replay;

pub use proxy::{CurrentPage, TimelineNormalizer};
pub use session::{CaptureError, CaptureSource, ProfilingOptions, TabId, TabMonitor};
pub use sink::EventSink;

#![forbid(unsafe_code)]
//! Typed wire payloads for the devtools page-event stream.
//!
//! The capture source pushes named signals with JSON bodies. This crate owns
//! the closed signal union ([`PageSignal`]), the tree-shaped timeline record
//! model ([`RawRecord`] / [`EventRecord`]), and the flat inspector network
//! messages. Validation happens exactly once, at the wire boundary; everything
//! past [`PageSignal::from_wire`] is strongly typed.
//!
//! This crate does **not** normalize times. Raw records carry source-clock
//! seconds; the synchronization proxy in `timeline_sync` decides the base
//! time and produces [`EventRecord`]s.

mod error;
mod inspector;
mod record;
mod signal;

pub use error::{RecordError, SignalError};
pub use inspector::{
    DetailedTiming, DidReceiveContentLength, DidReceiveResponse, InspectorData, InspectorKind,
    NetworkResponse, WillSendRequest,
};
pub use record::{
    normalize_seconds, EventRecord, RawRecord, RecordKind, RecordPayload, ResourceFinishData,
    ResourceId, ResourceResponseData, ResourceStartData,
};
pub use signal::PageSignal;

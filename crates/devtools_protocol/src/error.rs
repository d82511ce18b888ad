use thiserror::Error;

use crate::RecordKind;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("timeline record body has the wrong shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("malformed {kind:?} payload: {source}")]
    Payload {
        kind: RecordKind,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("addRecordToTimeline body is missing the record field")]
    MissingRecord,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("malformed `{method}` payload: {source}")]
    Payload {
        method: &'static str,
        source: serde_json::Error,
    },
}

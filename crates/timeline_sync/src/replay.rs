//! Replays a JSONL capture log into a session.
//!
//! Capture logs hold one `{"method": ..., "body": ...}` envelope per line,
//! the same pairs the live listener would deliver. Lines that cannot be
//! ingested (oversized, invalid UTF-8, malformed JSON) are skipped and
//! counted; they never abort the replay.

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::session::{CaptureSource, TabMonitor};
use crate::sink::EventSink;

/// Per-line byte budget. One timeline record tree comfortably fits; anything
/// larger is corrupt output or an unrelated stream.
pub const DEFAULT_MAX_LINE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ReplaySummary {
    /// Well-formed envelopes handed to the session.
    pub dispatched: usize,
    /// Lines skipped as noise.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct Envelope {
    method: String,
    #[serde(default)]
    body: Value,
}

/// Drives every envelope in `reader` through `monitor`, in order.
pub async fn drive_capture_log<R, C, S>(
    reader: R,
    monitor: &mut TabMonitor<C, S>,
) -> std::io::Result<ReplaySummary>
where
    R: AsyncRead + Unpin,
    C: CaptureSource,
    S: EventSink,
{
    drive_capture_log_bounded(reader, monitor, DEFAULT_MAX_LINE_BYTES).await
}

pub async fn drive_capture_log_bounded<R, C, S>(
    mut reader: R,
    monitor: &mut TabMonitor<C, S>,
    max_line_bytes: usize,
) -> std::io::Result<ReplaySummary>
where
    R: AsyncRead + Unpin,
    C: CaptureSource,
    S: EventSink,
{
    let mut summary = ReplaySummary::default();
    let mut line = Vec::new();
    let mut discarding = false;
    let mut chunk = [0u8; 8192];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        for &byte in &chunk[..read] {
            if byte == b'\n' {
                if discarding {
                    summary.skipped += 1;
                    discarding = false;
                } else {
                    consume_line(&line, monitor, &mut summary);
                }
                line.clear();
                continue;
            }
            if discarding {
                continue;
            }
            if line.len() == max_line_bytes {
                debug!(max_line_bytes, "capture line exceeds the byte budget");
                discarding = true;
                line.clear();
                continue;
            }
            line.push(byte);
        }
    }

    // Final line without a trailing newline.
    if discarding {
        summary.skipped += 1;
    } else {
        consume_line(&line, monitor, &mut summary);
    }
    Ok(summary)
}

fn consume_line<C: CaptureSource, S: EventSink>(
    line: &[u8],
    monitor: &mut TabMonitor<C, S>,
    summary: &mut ReplaySummary,
) {
    let Ok(text) = std::str::from_utf8(line) else {
        debug!("skipping capture line with invalid UTF-8");
        summary.skipped += 1;
        return;
    };
    let text = text.strip_suffix('\r').unwrap_or(text);
    if text.chars().all(char::is_whitespace) {
        return;
    }
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => {
            monitor.dispatch_wire(&envelope.method, &envelope.body);
            summary.dispatched += 1;
        }
        Err(error) => {
            debug!(%error, "skipping malformed capture line");
            summary.skipped += 1;
        }
    }
}

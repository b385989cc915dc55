//! Ingest loop: receiver lines in, published locations out.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, trace, warn};

use gpsbridge_core::LocationStore;
use gpsbridge_providers::GgaParser;

use crate::hub::BroadcastHub;

/// Longest line kept, terminator included. NMEA sentences are at most 82
/// characters; anything past this is noise and is discarded up to the next
/// newline.
pub const MAX_LINE_LEN: usize = 1024;

/// Counters for one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-empty lines read.
    pub lines: u64,
    /// Lines that produced a location.
    pub fixes: u64,
    /// Sentences of other types.
    pub ignored: u64,
    /// GGA sentences that failed validation, and overlong lines.
    pub rejected: u64,
}

enum Line {
    Complete,
    Overlong,
    Eof,
}

/// Read lines until the source ends, publishing every valid fix to `hub`.
///
/// Lines may end in CRLF or LF; bytes that are not UTF-8 are replaced rather
/// than ending the loop. A malformed sentence never stops ingestion, only a
/// read error does.
pub async fn run_ingest<R>(
    mut reader: R,
    parser: &GgaParser,
    hub: &BroadcastHub,
) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::with_capacity(128);

    loop {
        match read_line(&mut reader, &mut buf).await? {
            Line::Eof => {
                let updates = hub.store().read().await.update_count();
                info!(
                    "Serial stream ended after {} lines ({} fixes, {} store updates)",
                    stats.lines, stats.fixes, updates
                );
                return Ok(stats);
            }
            Line::Overlong => {
                stats.lines += 1;
                stats.rejected += 1;
                warn!("Discarded line longer than {} bytes", MAX_LINE_LEN);
                continue;
            }
            Line::Complete => {}
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim();
        if line.is_empty() {
            continue;
        }

        stats.lines += 1;
        trace!("NMEA: {}", line);

        match parser.parse(line) {
            Ok(Some(location)) => {
                stats.fixes += 1;
                let report = hub.publish(location).await;
                debug!(
                    "Location {} sent to {} subscribers",
                    location, report.delivered
                );
            }
            Ok(None) => stats.ignored += 1,
            Err(e) => {
                stats.rejected += 1;
                debug!("Rejected {:?}: {}", line, e);
            }
        }
    }
}

/// Read up to and including the next newline into `buf`, keeping at most
/// [`MAX_LINE_LEN`] bytes.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut read_any = false;
    let mut overlong = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (read_any, overlong) {
                (false, _) => Line::Eof,
                (true, true) => Line::Overlong,
                (true, false) => Line::Complete,
            });
        }
        read_any = true;

        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        if !overlong {
            if buf.len() + used > MAX_LINE_LEN {
                overlong = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..used]);
            }
        }
        reader.consume(used);

        if done {
            return Ok(if overlong { Line::Overlong } else { Line::Complete });
        }
    }
}

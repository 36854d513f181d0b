//! `rank,domain` CSV records
//!
//! The payload has no header and no quoting. Each line is `<rank>,<domain>`;
//! anything after a second comma is ignored. Parsing is lazy, one line at a
//! time, so the full million records never sit in memory together.

use std::io::{BufRead, Lines};
use std::iter::FusedIterator;
use tokio::sync::mpsc;
use tracing::debug;
use u1m_common::types::RankedEntry;

use super::{IngestError, IngestResult};

/// Lazy iterator of ranked entries over a line-oriented reader
///
/// Yields `Err` for the first bad line and nothing after it.
#[derive(Debug)]
pub struct RecordParser<R> {
    lines: Lines<R>,
    line: u64,
    done: bool,
}

impl<R: BufRead> RecordParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for RecordParser<R> {
    type Item = IngestResult<RankedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let next = self.lines.next()?;
        self.line += 1;

        let result = match next {
            Ok(text) => parse_line(&text, self.line),
            Err(e) => Err(malformed(self.line, format!("unreadable line: {}", e))),
        };

        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl<R: BufRead> FusedIterator for RecordParser<R> {}

fn malformed(line: u64, reason: impl Into<String>) -> IngestError {
    IngestError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

/// Parse one payload line (without its terminator)
pub fn parse_line(text: &str, line: u64) -> IngestResult<RankedEntry> {
    let text = if line == 1 {
        text.trim_start_matches('\u{feff}')
    } else {
        text
    };

    let mut fields = text.split(',');
    let rank_field = fields.next().unwrap_or_default();
    let Some(domain_field) = fields.next() else {
        return Err(malformed(line, format!("expected <rank>,<domain>, got {:?}", text)));
    };

    let rank: i32 = rank_field
        .trim()
        .parse()
        .map_err(|e| malformed(line, format!("invalid rank {:?}: {}", rank_field, e)))?;
    if rank < 1 {
        return Err(malformed(line, format!("rank must be positive, got {}", rank)));
    }

    let domain = domain_field.trim();
    if domain.is_empty() {
        return Err(malformed(line, "empty domain"));
    }

    Ok(RankedEntry::new(rank, domain))
}

/// Drain `records` into `tx`, blocking while the channel is full
///
/// Must run outside the async runtime (`spawn_blocking`). Returns the number
/// of records sent. A closed channel means the consumer has already failed,
/// so sending stops quietly and the consumer's error wins.
pub fn forward_records<I>(records: I, tx: &mpsc::Sender<RankedEntry>) -> IngestResult<u64>
where
    I: Iterator<Item = IngestResult<RankedEntry>>,
{
    let mut sent = 0u64;
    for record in records {
        let entry = record?;
        if tx.blocking_send(entry).is_err() {
            debug!(sent, "Record consumer closed, stopping parser");
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

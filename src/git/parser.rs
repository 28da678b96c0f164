//! Commit stream parser
//!
//! Turns the line output of
//! `git log --numstat --pretty=format:<LOG_FORMAT>` into [`CommitRecord`]s in
//! one forward scan. The parser is lazy and one-shot: it pulls lines from the
//! underlying source only as records are requested.
//!
//! ```text
//! \x1e<hash>\x1f<author date>\x1f<name>\x1f<email>\x1f<subject>
//! 12\t3\tsrc/lib.rs
//! -\t-\tassets/logo.png
//! ```
//!
//! Malformed input is absorbed: a bad timestamp drops that commit (and its
//! numstat lines), a bad numstat line contributes nothing. Both bump the
//! counter returned by [`CommitParser::malformed`].

use crate::error::{RecordParseError, RepositoryReadError};
use crate::models::CommitRecord;
use chrono::{DateTime, Utc};
use std::io;
use tracing::trace;

/// Marks the start of a commit header line.
pub const RECORD_SEPARATOR: char = '\x1e';
/// Separates fields within a header line.
pub const FIELD_SEPARATOR: char = '\x1f';
/// `--pretty=format:` string producing the header lines above.
pub const LOG_FORMAT: &str = "%x1e%H%x1f%aI%x1f%an%x1f%ae%x1f%s";

/// Streaming parser over a line source.
pub struct CommitParser<I> {
    lines: I,
    pending: Option<CommitRecord>,
    /// Inside a dropped commit; its numstat lines are ignored
    skipping: bool,
    seen_header: bool,
    malformed: u64,
    finished: bool,
}

impl<I> CommitParser<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            pending: None,
            skipping: false,
            seen_header: false,
            malformed: 0,
            finished: false,
        }
    }

    /// Number of malformed records absorbed so far.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    fn absorb(&mut self, err: RecordParseError) {
        trace!("skipping malformed log record: {}", err);
        self.malformed += 1;
    }

    fn handle_header(&mut self, header: &str) -> Option<CommitRecord> {
        self.seen_header = true;
        let finished = self.pending.take();
        match parse_header(header) {
            Ok(record) => {
                self.pending = Some(record);
                self.skipping = false;
            }
            Err(e) => {
                self.absorb(e);
                self.skipping = true;
            }
        }
        finished
    }

    fn handle_numstat(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.skipping {
            return;
        }
        if !self.seen_header {
            self.absorb(RecordParseError::Orphan);
            return;
        }
        match parse_numstat(line) {
            Ok((added, removed)) => {
                if let Some(commit) = self.pending.as_mut() {
                    commit.lines_added += added;
                    commit.lines_removed += removed;
                }
            }
            Err(e) => self.absorb(e),
        }
    }
}

impl<I> Iterator for CommitParser<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<CommitRecord, RepositoryReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.next() {
                None => {
                    self.finished = true;
                    return self.pending.take().map(Ok);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.pending = None;
                    return Some(Err(RepositoryReadError::Stream(e)));
                }
                Some(Ok(line)) => {
                    let line = line.trim_end_matches(['\n', '\r']);
                    if let Some(header) = line.strip_prefix(RECORD_SEPARATOR) {
                        if let Some(done) = self.handle_header(header) {
                            return Some(Ok(done));
                        }
                    } else {
                        self.handle_numstat(line);
                    }
                }
            }
        }
    }
}

/// Parse `hash \x1f date \x1f name \x1f email [\x1f subject]`.
fn parse_header(header: &str) -> Result<CommitRecord, RecordParseError> {
    let fields: Vec<&str> = header.splitn(5, FIELD_SEPARATOR).collect();
    if fields.len() < 4 || fields[0].trim().is_empty() {
        return Err(RecordParseError::TruncatedHeader(fields.len()));
    }

    Ok(CommitRecord {
        hash: fields[0].trim().to_string(),
        timestamp: parse_timestamp(fields[1])?,
        author_name: fields[2].to_string(),
        author_email: fields[3].to_string(),
        lines_added: 0,
        lines_removed: 0,
    })
}

/// Accepts strict ISO 8601 (`%aI`) and git's `--date=iso` form.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RecordParseError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RecordParseError::Timestamp(raw.to_string()))
}

/// Parse `added \t removed \t path`; `-` (binary) counts as zero.
fn parse_numstat(line: &str) -> Result<(u64, u64), RecordParseError> {
    let mut parts = line.splitn(3, '\t');
    let (Some(added), Some(removed), Some(_path)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(RecordParseError::Numstat(line.to_string()));
    };

    let count = |field: &str| -> Result<u64, RecordParseError> {
        match field.trim() {
            "-" => Ok(0),
            n => n
                .parse::<u64>()
                .map_err(|_| RecordParseError::Numstat(line.to_string())),
        }
    };
    Ok((count(added)?, count(removed)?))
}

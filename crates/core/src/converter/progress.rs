//! Incremental progress parsing of ffmpeg's diagnostic output.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duration: (\d+):(\d+):(\d+)\.(\d+)").expect("valid duration regex")
});

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d+):(\d\d):(\d\d)\.(\d\d)").expect("valid time regex"));

/// Longest unterminated line kept before it is scanned and trimmed.
const MAX_PENDING: usize = 1024;

/// Bytes kept from an overlong line so a token split across reads survives.
const PENDING_TAIL: usize = 64;

/// Turns chunks of diagnostic output into progress percentages.
///
/// Output is split on `\n` and `\r` (ffmpeg rewrites its status line with
/// carriage returns), so tokens split across reads are still seen whole.
/// Memory stays bounded: an unterminated line longer than [`MAX_PENDING`] is
/// scanned and then cut down to its last [`PENDING_TAIL`] bytes.
#[derive(Debug, Default)]
pub struct ProgressParser {
    pending: Vec<u8>,
    duration_ms: Option<u64>,
    last: Option<u8>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total input duration, once seen.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Last emitted percentage.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Consumes a chunk and returns the percentages to emit, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut emitted = Vec::new();

        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                let line = std::mem::take(&mut self.pending);
                self.scan(&line, &mut emitted);
            } else {
                self.pending.push(byte);
            }
        }

        if self.pending.len() > MAX_PENDING {
            let line = std::mem::take(&mut self.pending);
            self.scan(&line, &mut emitted);
            self.pending = line[line.len() - PENDING_TAIL..].to_vec();
        }

        emitted
    }

    /// Scans whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut emitted = Vec::new();
        let line = std::mem::take(&mut self.pending);
        self.scan(&line, &mut emitted);
        emitted
    }

    fn scan(&mut self, line: &[u8], emitted: &mut Vec<u8>) {
        if line.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(line);

        let Some(duration) = self.duration_ms else {
            if let Some(duration) = DURATION_RE.captures(&line).and_then(|c| to_ms(&c)) {
                self.duration_ms = Some(duration);
                self.last = Some(0);
                emitted.push(0);
            }
            return;
        };

        if duration == 0 {
            return;
        }

        for caps in TIME_RE.captures_iter(&line) {
            let Some(time) = to_ms(&caps) else {
                continue;
            };
            let percent = ((time as f64) * 100.0 / duration as f64).round().min(100.0) as u8;
            if self.last.map_or(true, |last| percent > last) {
                self.last = Some(percent);
                emitted.push(percent);
            }
        }
    }
}

/// `HH:MM:SS.cc` captures to milliseconds.
fn to_ms(caps: &Captures<'_>) -> Option<u64> {
    let field = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    let (h, m, s, c) = (field(1)?, field(2)?, field(3)?, field(4)?);
    Some((((h * 60 + m) * 60 + s) * 100 + c) * 10)
}

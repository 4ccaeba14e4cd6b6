//! Incremental parsing of `multipart/mixed` response bodies.
//!
//! The parser is fed chunks as they arrive and returns every part that is
//! complete so far. A part is complete once the delimiter that follows it
//! has been seen, so payloads are buffered one part at a time.

use crate::error::ClientError;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Media type without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
            .map(|v| v.split(';').next().unwrap_or_default().trim())
    }

    /// The `filename` parameter of `Content-Disposition`, unescaped.
    pub fn filename(&self) -> Option<String> {
        let disposition = self.header("Content-Disposition")?;
        let (_, rest) = disposition.split_once("filename=\"")?;

        let mut name = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => name.push(chars.next()?),
                '"' => return Some(name),
                c => name.push(c),
            }
        }
        None
    }

    pub fn is_keepalive(&self) -> bool {
        self.content_type() == Some("text/plain")
    }
}

/// Extracts the boundary parameter of a `multipart/mixed` content type.
pub fn boundary_of(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let media_type = params.next()?.trim();
    if !media_type.eq_ignore_ascii_case("multipart/mixed") {
        return None;
    }
    params
        .filter_map(|p| p.trim().strip_prefix("boundary="))
        .map(|b| b.trim_matches('"'))
        .find(|b| !b.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the next delimiter line.
    Delimiter,
    Headers,
    Body,
    /// The closing delimiter was seen.
    Done,
}

/// Splits a `multipart/mixed` byte stream into parts.
#[derive(Debug)]
pub struct PartParser {
    /// `CRLF--boundary`
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    /// Offset up to which `buf` holds no delimiter start.
    scanned: usize,
    headers: Vec<(String, String)>,
    state: State,
}

impl PartParser {
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: format!("\r\n--{boundary}").into_bytes(),
            // The first delimiter has no line break before it.
            buf: CRLF.to_vec(),
            scanned: 0,
            headers: Vec::new(),
            state: State::Delimiter,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feeds a chunk and returns the parts it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Part>, ClientError> {
        if self.state == State::Done {
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(chunk);

        let mut parts = Vec::new();
        loop {
            match self.state {
                State::Delimiter => {
                    let Some(at) = self.find_delimiter() else {
                        // Preamble: only a possible delimiter start is kept.
                        self.buf.drain(..self.scanned);
                        self.scanned = 0;
                        break;
                    };
                    let after = at + self.delimiter.len();
                    let next = [self.buf[after], self.buf[after + 1]];
                    match &next {
                        b"--" => {
                            self.buf.clear();
                            self.state = State::Done;
                            break;
                        }
                        b"\r\n" => {
                            self.buf.drain(..after + 2);
                            self.scanned = 0;
                            self.state = State::Headers;
                        }
                        _ => return Err(ClientError::malformed("unexpected bytes after boundary")),
                    }
                }
                State::Headers => {
                    if self.buf.starts_with(CRLF) {
                        self.buf.drain(..CRLF.len());
                        self.headers.clear();
                        self.state = State::Body;
                        continue;
                    }
                    let Some(end) = find(&self.buf, HEADER_END, 0) else {
                        break;
                    };
                    self.headers = parse_headers(&self.buf[..end])?;
                    self.buf.drain(..end + HEADER_END.len());
                    self.state = State::Body;
                }
                State::Body => {
                    let Some(at) = self.find_delimiter() else {
                        break;
                    };
                    let body: Vec<u8> = self.buf.drain(..at).collect();
                    self.scanned = 0;
                    parts.push(Part {
                        headers: std::mem::take(&mut self.headers),
                        body,
                    });
                    self.state = State::Delimiter;
                }
                State::Done => break,
            }
        }
        Ok(parts)
    }

    /// Fails when the body ended before its closing delimiter.
    pub fn finish(&self) -> Result<(), ClientError> {
        if self.is_done() {
            Ok(())
        } else {
            Err(ClientError::malformed("body ended before the closing boundary"))
        }
    }

    /// Position of the next delimiter followed by CRLF or `--`.
    ///
    /// When none is found, `scanned` is moved past every byte that cannot
    /// start one.
    fn find_delimiter(&mut self) -> Option<usize> {
        let mut from = self.scanned;
        while let Some(at) = find(&self.buf, &self.delimiter, from) {
            let after = at + self.delimiter.len();
            match self.buf.get(after..after + 2) {
                None => {
                    self.scanned = at;
                    return None;
                }
                Some(b"--") | Some(b"\r\n") => return Some(at),
                Some(_) => from = at + 1,
            }
        }
        self.scanned = self
            .buf
            .len()
            .saturating_sub(self.delimiter.len() - 1)
            .max(from.min(self.buf.len()));
        None
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

fn parse_headers(head: &[u8]) -> Result<Vec<(String, String)>, ClientError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| ClientError::malformed("part headers are not UTF-8"))?;
    head.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| ClientError::malformed(format!("invalid header line {line:?}")))
        })
        .collect()
}

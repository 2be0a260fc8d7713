//! Incremental parser for transactional HTTP response bodies
//!
//! The response is a single JSON object with two array fields, `results`
//! and `errors`, in no guaranteed order. Result arrays can run to many
//! megabytes, so the parser walks the byte stream once and hands each
//! result object to the consumer as soon as its closing brace arrives,
//! without waiting for the rest of the array. The errors array is assumed
//! small and is decoded in one piece.
//!
//! The parser is pull-based and push-fed: callers append raw chunks with
//! [`StreamingParser::push`] and repeatedly call
//! [`StreamingParser::advance`], which returns [`Step::NeedInput`] until a
//! complete unit is available. This keeps it fully testable against
//! literal byte buffers, with no network in sight.

use crate::statement::{QueryResult, ResponseError};
use crate::{GraphError, GraphResult};
use serde_json::Value;
use tracing::debug;

/// Buffer offset below which consumed bytes are not yet compacted away
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Parser state over the top-level response object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Between top-level fields (also before the opening brace)
    AwaitField,
    /// Inside the `results` array, yielding one result per element
    InResultsArray,
    /// Positioned at the start of the `errors` array, waiting for it to
    /// be complete in the buffer
    InErrorsArray,
    /// Closing brace of the top-level object seen; trailing bytes are
    /// discarded
    Done,
}

/// One step of parser progress
#[derive(Debug)]
pub enum Step {
    /// More input is required before the next unit can be decoded
    NeedInput,
    /// A complete result object was decoded
    Result(QueryResult),
    /// The top-level object is closed; no further results will appear
    Done,
}

/// Token-driven state machine over a growable byte buffer
pub struct StreamingParser {
    buf: Vec<u8>,
    pos: usize,
    state: ParseState,
    saw_open_brace: bool,
    errors: Vec<ResponseError>,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: ParseState::AwaitField,
            saw_open_brace: false,
            errors: Vec::new(),
        }
    }

    /// Append a raw chunk of the response body
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Protocol-level errors collected so far. Complete once
    /// [`Step::Done`] has been returned.
    pub fn errors(&self) -> &[ResponseError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ResponseError> {
        std::mem::take(&mut self.errors)
    }

    /// Drive the state machine forward by one unit
    pub fn advance(&mut self) -> GraphResult<Step> {
        self.compact();

        loop {
            match self.state {
                ParseState::Done => return Ok(Step::Done),
                ParseState::AwaitField => match self.advance_await_field()? {
                    Some(step) => return Ok(step),
                    None => continue,
                },
                ParseState::InResultsArray => match self.advance_results()? {
                    Some(step) => return Ok(step),
                    None => continue,
                },
                ParseState::InErrorsArray => match self.advance_errors()? {
                    Some(step) => return Ok(step),
                    None => continue,
                },
            }
        }
    }

    /// Parse from between top-level fields. Returns `None` to continue
    /// looping after a state transition.
    fn advance_await_field(&mut self) -> GraphResult<Option<Step>> {
        if !self.saw_open_brace {
            let Some(b) = self.peek_non_ws() else {
                return Ok(Some(Step::NeedInput));
            };
            if b != b'{' {
                return Err(GraphError::Protocol(format!(
                    "expected response object, found byte {:?}",
                    b as char
                )));
            }
            self.pos += 1;
            self.saw_open_brace = true;
        }

        let Some(b) = self.peek_non_ws() else {
            return Ok(Some(Step::NeedInput));
        };

        match b {
            b',' => {
                self.pos += 1;
                Ok(None)
            }
            b'}' => {
                self.pos += 1;
                self.state = ParseState::Done;
                Ok(Some(Step::Done))
            }
            b'"' => {
                // Field name, colon and the start of the value must all be
                // visible before anything is consumed, so an incomplete
                // prefix is simply re-parsed on the next call.
                let name_start = self.pos;
                let Some(name_end) = scan_string(&self.buf, name_start) else {
                    return Ok(Some(Step::NeedInput));
                };
                let name: String = serde_json::from_slice(&self.buf[name_start..name_end])?;

                let Some(colon) = next_non_ws(&self.buf, name_end) else {
                    return Ok(Some(Step::NeedInput));
                };
                if self.buf[colon] != b':' {
                    return Err(GraphError::Protocol(format!(
                        "expected ':' after field {:?}",
                        name
                    )));
                }
                let Some(value_start) = next_non_ws(&self.buf, colon + 1) else {
                    return Ok(Some(Step::NeedInput));
                };

                match (name.as_str(), self.buf[value_start]) {
                    ("results", b'[') => {
                        self.pos = value_start + 1;
                        self.state = ParseState::InResultsArray;
                        Ok(None)
                    }
                    ("errors", b'[') => {
                        self.pos = value_start;
                        self.state = ParseState::InErrorsArray;
                        Ok(None)
                    }
                    _ => {
                        // Unknown field: skip its whole value
                        let Some(end) = scan_value(&self.buf, value_start) else {
                            return Ok(Some(Step::NeedInput));
                        };
                        debug!(field = %name, "Skipping unknown response field");
                        self.pos = end;
                        Ok(None)
                    }
                }
            }
            other => Err(GraphError::Protocol(format!(
                "unexpected byte {:?} in response object",
                other as char
            ))),
        }
    }

    /// Yield the next element of the results array, or leave the array
    fn advance_results(&mut self) -> GraphResult<Option<Step>> {
        let Some(b) = self.peek_non_ws() else {
            return Ok(Some(Step::NeedInput));
        };

        match b {
            b']' => {
                self.pos += 1;
                self.state = ParseState::AwaitField;
                Ok(None)
            }
            b',' => {
                self.pos += 1;
                Ok(None)
            }
            b'{' => {
                let start = self.pos;
                let Some(end) = scan_value(&self.buf, start) else {
                    return Ok(Some(Step::NeedInput));
                };
                let result: QueryResult = serde_json::from_slice(&self.buf[start..end])?;
                self.pos = end;
                Ok(Some(Step::Result(result)))
            }
            other => Err(GraphError::Protocol(format!(
                "unexpected byte {:?} in results array",
                other as char
            ))),
        }
    }

    /// Decode the complete errors array in one piece
    fn advance_errors(&mut self) -> GraphResult<Option<Step>> {
        let start = self.pos;
        let Some(end) = scan_value(&self.buf, start) else {
            return Ok(Some(Step::NeedInput));
        };
        let raw: Vec<Value> = serde_json::from_slice(&self.buf[start..end])?;
        self.errors
            .extend(raw.iter().map(ResponseError::from_value));
        self.pos = end;
        self.state = ParseState::AwaitField;
        Ok(None)
    }

    /// Skip whitespace and return the byte at the new position, without
    /// consuming it
    fn peek_non_ws(&mut self) -> Option<u8> {
        let idx = next_non_ws(&self.buf, self.pos)?;
        self.pos = idx;
        Some(self.buf[idx])
    }

    /// Discard consumed bytes once they pile up
    fn compact(&mut self) {
        if self.pos > COMPACT_THRESHOLD {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}

impl Default for StreamingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the next non-whitespace byte at or after `from`
fn next_non_ws(buf: &[u8], from: usize) -> Option<usize> {
    buf[from.min(buf.len())..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|offset| from + offset)
}

/// End (exclusive) of the JSON string starting at `start` (which must be
/// a `"`), or `None` if the string is not yet complete in the buffer
fn scan_string(buf: &[u8], start: usize) -> Option<usize> {
    debug_assert_eq!(buf.get(start), Some(&b'"'));
    let mut escaped = false;
    for (i, &b) in buf.iter().enumerate().skip(start + 1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(i + 1);
        }
    }
    None
}

/// End (exclusive) of the balanced JSON value starting at `start`, or
/// `None` if the value is not yet complete in the buffer.
///
/// Handles objects, arrays, strings and scalars; string contents and
/// escapes do not disturb the depth count.
fn scan_value(buf: &[u8], start: usize) -> Option<usize> {
    match buf.get(start)? {
        b'"' => scan_string(buf, start),
        b'{' | b'[' => {
            let mut depth = 0usize;
            let mut i = start;
            while i < buf.len() {
                match buf[i] {
                    b'"' => {
                        i = scan_string(buf, i)?;
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        // Scalar: runs until a delimiter. The enclosing object guarantees
        // a trailing delimiter eventually arrives.
        _ => buf[start..]
            .iter()
            .position(|b| matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace())
            .map(|offset| start + offset),
    }
}

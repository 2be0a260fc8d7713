//! Lazy, single-pass transport responses
//!
//! A [`TransportResponse`] is the result of executing one or more
//! statements. It is consumable exactly once: results are pulled with
//! [`TransportResponse::next_result`] until `None`, after which any
//! further pull fails with an invalid-state error. The underlying channel
//! (for the HTTP transport, the response body) is released exactly once,
//! either on natural exhaustion or on [`TransportResponse::close`].

use crate::statement::{QueryResult, ResponseError};
use crate::stream::{Step, StreamingParser};
use crate::{GraphError, GraphResult};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;

/// Consumption state of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    /// Results may still be pulled
    Open,
    /// Natural exhaustion: `next_result` returned `None`
    Drained,
    /// Explicitly closed (or abandoned); channel released
    Closed,
}

enum ResponseBody {
    /// Fully materialized results (embedded and session transports)
    Buffered(VecDeque<QueryResult>),
    /// Incrementally parsed byte stream (HTTP transport). `None` once the
    /// channel has been released.
    Streaming {
        parser: StreamingParser,
        chunks: Option<BoxStream<'static, GraphResult<Bytes>>>,
    },
}

/// The lazy, single-consumption result of executing statements
pub struct TransportResponse {
    body: ResponseBody,
    errors: Vec<ResponseError>,
    state: ResponseState,
}

impl TransportResponse {
    /// Response backed by already-materialized results
    pub fn buffered(results: Vec<QueryResult>, errors: Vec<ResponseError>) -> Self {
        Self {
            body: ResponseBody::Buffered(results.into()),
            errors,
            state: ResponseState::Open,
        }
    }

    /// Response backed by a chunked byte stream, parsed incrementally
    pub fn streaming(chunks: BoxStream<'static, GraphResult<Bytes>>) -> Self {
        Self {
            body: ResponseBody::Streaming {
                parser: StreamingParser::new(),
                chunks: Some(chunks),
            },
            errors: Vec::new(),
            state: ResponseState::Open,
        }
    }

    /// Pull the next result.
    ///
    /// Returns `Ok(None)` exactly once, on natural exhaustion; any call
    /// after that (or after [`close`](Self::close)) fails with
    /// [`GraphError::ResponseConsumed`].
    pub async fn next_result(&mut self) -> GraphResult<Option<QueryResult>> {
        match self.state {
            ResponseState::Open => {}
            ResponseState::Drained | ResponseState::Closed => {
                return Err(GraphError::ResponseConsumed)
            }
        }

        match &mut self.body {
            ResponseBody::Buffered(results) => match results.pop_front() {
                Some(result) => Ok(Some(result)),
                None => {
                    self.state = ResponseState::Drained;
                    Ok(None)
                }
            },
            ResponseBody::Streaming { parser, chunks } => loop {
                match parser.advance() {
                    Ok(Step::Result(result)) => return Ok(Some(result)),
                    Ok(Step::Done) => {
                        // Trailing bytes are discarded with the stream;
                        // the channel is released exactly once.
                        self.errors.extend(parser.take_errors());
                        *chunks = None;
                        self.state = ResponseState::Drained;
                        return Ok(None);
                    }
                    Ok(Step::NeedInput) => {
                        let Some(stream) = chunks.as_mut() else {
                            return Err(GraphError::ResponseConsumed);
                        };
                        match stream.next().await {
                            Some(Ok(bytes)) => parser.push(&bytes),
                            Some(Err(e)) => {
                                *chunks = None;
                                self.state = ResponseState::Closed;
                                return Err(e);
                            }
                            None => {
                                *chunks = None;
                                self.state = ResponseState::Closed;
                                return Err(GraphError::Protocol(
                                    "response body ended before the result object was closed"
                                        .to_string(),
                                ));
                            }
                        }
                    }
                    Err(e) => {
                        *chunks = None;
                        self.state = ResponseState::Closed;
                        return Err(e);
                    }
                }
            },
        }
    }

    /// Consume the response expecting exactly one result.
    ///
    /// Fails with [`GraphError::NoResult`] on zero results and
    /// [`GraphError::MultipleResults`] when more than one is present.
    pub async fn single(mut self) -> GraphResult<QueryResult> {
        let first = self.next_result().await?.ok_or(GraphError::NoResult)?;
        match self.next_result().await? {
            None => Ok(first),
            Some(_) => {
                self.close();
                Err(GraphError::MultipleResults)
            }
        }
    }

    /// Drain all remaining results into memory
    pub async fn collect_results(&mut self) -> GraphResult<Vec<QueryResult>> {
        let mut out = Vec::new();
        while let Some(result) = self.next_result().await? {
            out.push(result);
        }
        Ok(out)
    }

    /// Release the underlying channel. Idempotent; safe to call at any
    /// point, including after exhaustion or mid-iteration abandonment.
    pub fn close(&mut self) {
        if let ResponseBody::Streaming { chunks, .. } = &mut self.body {
            *chunks = None;
        }
        self.state = ResponseState::Closed;
    }

    /// Protocol-level errors reported by the transport.
    ///
    /// For streaming responses this list is final only after the response
    /// has been fully consumed.
    pub fn errors(&self) -> &[ResponseError] {
        match &self.body {
            ResponseBody::Streaming { parser, .. } if self.state == ResponseState::Open => {
                parser.errors()
            }
            _ => &self.errors,
        }
    }
}

impl Drop for TransportResponse {
    fn drop(&mut self) {
        // Abandonment releases the channel like an explicit close
        self.close();
    }
}

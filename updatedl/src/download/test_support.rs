//! In-memory transport for unit tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use reqwest::StatusCode;

use crate::session::{ByteRange, Transport, TransportError, TransportResponse};

/// How the fake server treats requests.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RangeMode {
    /// Serve 206 for satisfiable ranges and 416 otherwise.
    Honour,
    /// Always serve the full body with 200.
    Ignore,
    /// Answer every known URL with this status and an empty body.
    Status(StatusCode),
    /// Serve the full body but fail the connection after this many bytes.
    DropAfter(usize),
    /// Fail before any response is received.
    Unreachable,
}

pub(crate) struct FakeTransport {
    files: HashMap<String, Vec<u8>>,
    mode: RangeMode,
    requests: Mutex<Vec<(String, Option<ByteRange>)>>,
}

impl FakeTransport {
    pub(crate) fn new(mode: RangeMode) -> Self {
        Self {
            files: HashMap::new(),
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_file(mut self, url: &str, content: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), content);
        self
    }

    pub(crate) fn requests(&self) -> Vec<(String, Option<ByteRange>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push((url.to_string(), range));

        if let RangeMode::Unreachable = self.mode {
            return Err(TransportError::Request {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let Some(content) = self.files.get(url) else {
            return Ok(response(StatusCode::NOT_FOUND, Vec::new()));
        };

        Ok(match (self.mode, range) {
            (RangeMode::Status(status), _) => response(status, Vec::new()),
            (RangeMode::DropAfter(limit), _) => TransportResponse {
                status: StatusCode::OK,
                body: Box::new(FailingBody {
                    data: Cursor::new(content[..limit.min(content.len())].to_vec()),
                }),
            },
            (RangeMode::Ignore, _) | (RangeMode::Honour, None) => {
                response(StatusCode::OK, content.clone())
            }
            (RangeMode::Honour, Some(range)) => {
                let start = range.start as usize;
                if start >= content.len() {
                    response(StatusCode::RANGE_NOT_SATISFIABLE, Vec::new())
                } else {
                    let end = (range.end as usize).saturating_add(1).min(content.len());
                    response(StatusCode::PARTIAL_CONTENT, content[start..end].to_vec())
                }
            }
            (RangeMode::Unreachable, _) => unreachable!(),
        })
    }
}

/// Deterministic, non-repeating-looking test payload.
pub(crate) fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

fn response(status: StatusCode, content: Vec<u8>) -> TransportResponse {
    TransportResponse {
        status,
        body: Box::new(Cursor::new(content)),
    }
}

/// Yields its data, then fails instead of reporting end of stream.
struct FailingBody {
    data: Cursor<Vec<u8>>,
}

impl Read for FailingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
            n => Ok(n),
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wazuh-DB client: UNIX stream socket with little-endian u32
//! length-prefixed frames.
//!
//! Connections are pooled: a query checks one out (connecting when the
//! pool is empty), runs the round-trip, and returns it only on success.
//! A connection that saw an I/O error is dropped, never re-pooled.

use parking_lot::Mutex;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Frames beyond this size are refused rather than buffered.
const MAX_FRAME: usize = 1 << 16;

/// Idle connections kept per pool.
const MAX_IDLE: usize = 4;

#[derive(Debug, Error)]
pub enum WdbError {
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("frame of {0} bytes exceeds the {MAX_FRAME} byte limit")]
    FrameTooLarge(usize),
    #[error("peer closed the connection mid-frame")]
    Closed,
    #[error("response is not valid UTF-8")]
    BadEncoding,
}

/// Result code parsed from the first token of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCode {
    Ok,
    Due,
    Error,
    Ignore,
    Unknown,
}

impl QueryCode {
    fn parse(token: &str) -> Self {
        match token {
            "ok" => QueryCode::Ok,
            "due" => QueryCode::Due,
            "err" => QueryCode::Error,
            "ign" => QueryCode::Ignore,
            _ => QueryCode::Unknown,
        }
    }
}

/// Split a raw response into its code and optional payload.
pub fn parse_response(raw: &str) -> (QueryCode, Option<String>) {
    match raw.split_once(' ') {
        Some((token, payload)) => (QueryCode::parse(token), Some(payload.to_string())),
        None => (QueryCode::parse(raw), None),
    }
}

struct Connection {
    stream: UnixStream,
}

impl Connection {
    fn open(path: &Path, timeout: Duration) -> Result<Self, WdbError> {
        let io = |source| WdbError::Io {
            path: path.display().to_string(),
            source,
        };
        let stream = UnixStream::connect(path).map_err(io)?;
        stream.set_read_timeout(Some(timeout)).map_err(io)?;
        stream.set_write_timeout(Some(timeout)).map_err(io)?;
        Ok(Self { stream })
    }

    fn round_trip(&mut self, path: &Path, query: &str) -> Result<String, WdbError> {
        let io = |source| WdbError::Io {
            path: path.display().to_string(),
            source,
        };
        let bytes = query.as_bytes();
        if bytes.len() > MAX_FRAME {
            return Err(WdbError::FrameTooLarge(bytes.len()));
        }
        let len = (bytes.len() as u32).to_le_bytes();
        self.stream.write_all(&len).map_err(io)?;
        self.stream.write_all(bytes).map_err(io)?;

        let mut header = [0u8; 4];
        read_exact(&mut self.stream, &mut header, path)?;
        let size = u32::from_le_bytes(header) as usize;
        if size > MAX_FRAME {
            return Err(WdbError::FrameTooLarge(size));
        }
        let mut payload = vec![0u8; size];
        read_exact(&mut self.stream, &mut payload, path)?;
        String::from_utf8(payload).map_err(|_| WdbError::BadEncoding)
    }
}

fn read_exact(stream: &mut UnixStream, buf: &mut [u8], path: &Path) -> Result<(), WdbError> {
    stream.read_exact(buf).map_err(|source| {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            WdbError::Closed
        } else {
            WdbError::Io {
                path: path.display().to_string(),
                source,
            }
        }
    })
}

/// Pooled client for the process-wide wazuh-DB socket.
pub struct WdbPool {
    path: PathBuf,
    timeout: Duration,
    idle: Mutex<Vec<Connection>>,
}

impl WdbPool {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Send one query and parse the framed response.
    pub fn query(&self, query: &str) -> Result<(QueryCode, Option<String>), WdbError> {
        let mut conn = match self.idle.lock().pop() {
            Some(conn) => conn,
            None => Connection::open(&self.path, self.timeout)?,
        };
        match conn.round_trip(&self.path, query) {
            Ok(raw) => {
                let mut idle = self.idle.lock();
                if idle.len() < MAX_IDLE {
                    idle.push(conn);
                }
                Ok(parse_response(&raw))
            }
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "dropping wdb connection");
                Err(err)
            }
        }
    }

    /// Drop all idle connections.
    pub fn drain(&self) {
        self.idle.lock().clear();
    }
}

#[cfg(test)]
#[path = "wdb_tests.rs"]
mod tests;

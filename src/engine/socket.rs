//! Unix socket bridge to the update engine
//!
//! Wire format:
//!
//! - progress socket: back-to-back frames of exactly [`RECORD_SIZE`] bytes
//! - notification socket: newline-terminated UTF-8 lines
//! - control socket: request header (`CONTROL_MAGIC`, dry run flag, source
//!   code, each u32 LE), answered by a u32 LE acceptance code (0 = accepted);
//!   then chunks framed by a u32 LE length with 0 ending the stream,
//!   answered by the final status code as u32 LE

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;

use super::{
    ChunkFeed, EndOfUpdate, EngineConfig, EngineError, NotificationSource, ProgressSource,
    UpdateEngine, UpdateRequest,
};
use crate::core::types::{ProgressRecord, UpdateStatus, RECORD_SIZE};
use crate::notification::NOTIFICATION_CAPACITY;

/// First word of every install request
pub const CONTROL_MAGIC: u32 = u32::from_le_bytes(*b"SWUI");

/// Acceptance code for an install request
pub const REQUEST_ACCEPTED: u32 = 0;

/// Engine client speaking to the bridge sockets
#[derive(Debug, Clone)]
pub struct SocketEngine {
    config: EngineConfig,
}

impl SocketEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn connect(path: &Path) -> Result<UnixStream, EngineError> {
    UnixStream::connect(path).map_err(|source| EngineError::Connect {
        endpoint: path.display().to_string(),
        source,
    })
}

fn read_u32(stream: &mut impl Read) -> io::Result<u32> {
    let mut raw = [0u8; 4];
    stream.read_exact(&mut raw)?;
    Ok(u32::from_le_bytes(raw))
}

fn closed_or_io(e: io::Error) -> EngineError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        EngineError::Closed
    } else {
        EngineError::Io(e)
    }
}

impl UpdateEngine for SocketEngine {
    fn connect_progress(&self) -> Result<Box<dyn ProgressSource>, EngineError> {
        let stream = connect(&self.config.progress_socket)?;
        Ok(Box::new(SocketProgress::new(stream)?))
    }

    fn connect_notifications(&self) -> Result<Box<dyn NotificationSource>, EngineError> {
        let stream = connect(&self.config.notification_socket)?;
        Ok(Box::new(SocketNotifications::new(stream)?))
    }

    fn start_update(
        &self,
        request: UpdateRequest,
        mut feed: ChunkFeed,
        on_end: EndOfUpdate,
    ) -> Result<(), EngineError> {
        let mut stream = connect(&self.config.control_socket)?;

        let mut header = [0u8; 12];
        header[0..4].copy_from_slice(&CONTROL_MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&u32::from(request.dry_run).to_le_bytes());
        header[8..12].copy_from_slice(&request.source.code().to_le_bytes());
        stream.write_all(&header)?;

        let ack = read_u32(&mut stream).map_err(closed_or_io)?;
        if ack != REQUEST_ACCEPTED {
            return Err(EngineError::Rejected(format!(
                "engine refused install request (code {})",
                ack
            )));
        }

        let chunk_size = request.chunk_size.max(1);
        thread::Builder::new()
            .name("update-feeder".to_string())
            .spawn(move || {
                let status = match feed_chunks(&mut stream, &mut feed, chunk_size) {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!("Lost connection to update engine while feeding: {}", e);
                        UpdateStatus::Failure
                    }
                };
                on_end(status);
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        tracing::info!(
            "Install request accepted (dry run: {}, chunk size: {})",
            request.dry_run,
            chunk_size
        );
        Ok(())
    }
}

fn feed_chunks(
    stream: &mut UnixStream,
    feed: &mut ChunkFeed,
    chunk_size: usize,
) -> io::Result<UpdateStatus> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let len = feed(buf.as_mut_slice()).min(buf.len());
        stream.write_all(&(len as u32).to_le_bytes())?;
        if len == 0 {
            break;
        }
        stream.write_all(&buf[..len])?;
    }
    stream.flush()?;

    let code = read_u32(stream)?;
    Ok(UpdateStatus::from_code(code).unwrap_or_else(|| {
        tracing::warn!("Unknown final status {} from update engine", code);
        UpdateStatus::Failure
    }))
}

/// Progress stream over a connected socket
///
/// The socket is non-blocking; a frame split across reads is kept until
/// its remaining bytes arrive.
pub struct SocketProgress {
    stream: UnixStream,
    buf: Box<[u8; RECORD_SIZE]>,
    filled: usize,
}

impl SocketProgress {
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            buf: Box::new([0u8; RECORD_SIZE]),
            filled: 0,
        })
    }
}

impl AsFd for SocketProgress {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl ProgressSource for SocketProgress {
    fn receive(&mut self) -> Result<Option<ProgressRecord>, EngineError> {
        while self.filled < RECORD_SIZE {
            match self.stream.read(&mut self.buf[self.filled..]) {
                Ok(0) => return Err(EngineError::Closed),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(EngineError::Io(e)),
            }
        }
        self.filled = 0;
        Ok(Some(ProgressRecord::from_bytes(&self.buf[..])?))
    }
}

/// Notification stream over a connected socket
///
/// The socket is non-blocking; bytes of an unterminated line are kept until
/// the newline arrives. A line longer than the log entry capacity keeps only
/// its head.
pub struct SocketNotifications {
    stream: UnixStream,
    pending: Vec<u8>,
}

impl SocketNotifications {
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            pending: Vec::new(),
        })
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Append freshly read bytes, dropping whatever a line carries beyond
    /// [`NOTIFICATION_CAPACITY`]
    fn buffer(&mut self, mut bytes: &[u8]) {
        let mut line_len = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(end) => self.pending.len() - end - 1,
            None => self.pending.len(),
        };
        loop {
            let room = NOTIFICATION_CAPACITY.saturating_sub(line_len);
            match bytes.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.pending.extend_from_slice(&bytes[..end.min(room)]);
                    self.pending.push(b'\n');
                    bytes = &bytes[end + 1..];
                    line_len = 0;
                }
                None => {
                    self.pending.extend_from_slice(&bytes[..bytes.len().min(room)]);
                    return;
                }
            }
        }
    }
}

impl AsFd for SocketNotifications {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl NotificationSource for SocketNotifications {
    fn receive(&mut self) -> Result<Option<String>, EngineError> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            match self.stream.read(&mut chunk) {
                Ok(0) if self.pending.is_empty() => return Err(EngineError::Closed),
                // last words before the peer went away
                Ok(0) => {
                    let rest = std::mem::take(&mut self.pending);
                    return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
                }
                Ok(n) => self.buffer(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(EngineError::Io(e)),
            }
        }
    }

    fn has_buffered(&self) -> bool {
        self.pending.contains(&b'\n')
    }
}

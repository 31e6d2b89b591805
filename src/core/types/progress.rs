//! Progress record types
//!
//! Defines the fixed-layout progress record exchanged between the update
//! monitor and the display thread, together with its wire codec.

use std::fmt;

use thiserror::Error;

use crate::core::utils::truncate_to_boundary;

/// Maximum number of info bytes carried by a single record
pub const INFO_CAPACITY: usize = 2048;

/// Size of the fixed header preceding the info bytes:
/// status, source, current step, total steps, current percent, info length
const HEADER_SIZE: usize = 6 * 4;

/// Size of one encoded record on the wire
pub const RECORD_SIZE: usize = HEADER_SIZE + INFO_CAPACITY;

/// Update status reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum UpdateStatus {
    Idle = 0,
    Start = 1,
    Run = 2,
    Download = 3,
    Progress = 4,
    Success = 5,
    Failure = 6,
    Done = 7,
    Subprocess = 8,
}

impl UpdateStatus {
    /// Map a wire status code to a known status
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Start),
            2 => Some(Self::Run),
            3 => Some(Self::Download),
            4 => Some(Self::Progress),
            5 => Some(Self::Success),
            6 => Some(Self::Failure),
            7 => Some(Self::Done),
            8 => Some(Self::Subprocess),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// SUCCESS and FAILURE end an update cycle
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Start => "START",
            Self::Run => "RUN",
            Self::Download => "DOWNLOAD",
            Self::Progress => "PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Done => "DONE",
            Self::Subprocess => "SUBPROCESS",
        };
        f.write_str(name)
    }
}

/// Origin that triggered an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum UpdateSource {
    #[default]
    Unknown = 0,
    WebServer = 1,
    Backend = 2,
    Downloader = 3,
    ChunksDownloader = 4,
    Local = 5,
}

impl UpdateSource {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::WebServer),
            2 => Some(Self::Backend),
            3 => Some(Self::Downloader),
            4 => Some(Self::ChunksDownloader),
            5 => Some(Self::Local),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Human readable interface name
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::WebServer => "WEBSERVER",
            Self::Backend => "BACKEND",
            Self::Downloader => "DOWNLOADER",
            Self::ChunksDownloader => "CHUNKS DOWNLOADER",
            Self::Local => "LOCAL",
        }
    }

    /// Label for a raw source code; unknown codes render as `(<code>)`
    pub fn label_for_code(code: u32) -> String {
        match Self::from_code(code) {
            Some(source) => source.label().to_string(),
            None => {
                tracing::warn!("Invalid update source: {}", code);
                format!("({})", code)
            }
        }
    }
}

/// Errors raised while decoding a record from the wire
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Invalid record size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    #[error("Info length {0} exceeds capacity {INFO_CAPACITY}")]
    InfoTooLong(usize),
}

/// One progress update
///
/// Records are plain values: they are copied into the channel and never
/// modified once enqueued. The status and source are kept as raw wire codes
/// so that unrecognized values survive transport and can be reported by the
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    status: u32,
    source: u32,
    current_step: u32,
    total_steps: u32,
    current_percent: u32,
    info: String,
}

impl ProgressRecord {
    /// Create a record with the given status and no progress information
    pub fn new(status: UpdateStatus) -> Self {
        Self::from_status_code(status.code())
    }

    /// Create a record from a raw status code, recognized or not
    pub fn from_status_code(status: u32) -> Self {
        Self {
            status,
            source: UpdateSource::Unknown.code(),
            current_step: 0,
            total_steps: 0,
            current_percent: 0,
            info: String::new(),
        }
    }

    /// Synthesized FAILURE record carrying an error description
    pub fn failure(info: &str) -> Self {
        Self::new(UpdateStatus::Failure).with_info(info)
    }

    pub fn with_source(mut self, source: UpdateSource) -> Self {
        self.source = source.code();
        self
    }

    /// Set step counters; the current step is clamped to the total when the
    /// total is known
    pub fn with_steps(mut self, current_step: u32, total_steps: u32) -> Self {
        self.total_steps = total_steps;
        self.current_step = if total_steps > 0 {
            current_step.min(total_steps)
        } else {
            current_step
        };
        self
    }

    /// Set the percentage of the current step, clamped to 100
    pub fn with_percent(mut self, percent: u32) -> Self {
        self.current_percent = percent.min(100);
        self
    }

    /// Set the info text, truncated to [`INFO_CAPACITY`] bytes
    pub fn with_info(mut self, info: &str) -> Self {
        self.info = truncate_to_boundary(info, INFO_CAPACITY).to_string();
        self
    }

    /// Known status, or `None` for codes this build does not recognize
    pub fn status(&self) -> Option<UpdateStatus> {
        UpdateStatus::from_code(self.status)
    }

    pub fn status_code(&self) -> u32 {
        self.status
    }

    pub fn source(&self) -> Option<UpdateSource> {
        UpdateSource::from_code(self.source)
    }

    pub fn source_code(&self) -> u32 {
        self.source
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn current_percent(&self) -> u32 {
        self.current_percent
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    /// Length in bytes of the stored info text
    pub fn info_len(&self) -> usize {
        self.info.len()
    }

    /// Whether this record ends an update cycle
    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(UpdateStatus::is_terminal)
    }

    /// Encode into exactly [`RECORD_SIZE`] bytes (little endian header,
    /// zero-padded info)
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        let header = [
            self.status,
            self.source,
            self.current_step,
            self.total_steps,
            self.current_percent,
            self.info.len() as u32,
        ];
        for (slot, value) in buf.chunks_exact_mut(4).zip(header) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        buf[HEADER_SIZE..HEADER_SIZE + self.info.len()].copy_from_slice(self.info.as_bytes());
        buf
    }

    /// Decode a record received from the wire
    ///
    /// Header values are kept exactly as sent. Invalid UTF-8 in the info
    /// text is replaced, and the result is cut back to [`INFO_CAPACITY`]
    /// bytes if the replacement grew it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() != RECORD_SIZE {
            return Err(RecordError::InvalidSize {
                expected: RECORD_SIZE,
                actual: bytes.len(),
            });
        }

        let field = |index: usize| {
            let start = index * 4;
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[start..start + 4]);
            u32::from_le_bytes(raw)
        };

        let info_len = field(5) as usize;
        if info_len > INFO_CAPACITY {
            return Err(RecordError::InfoTooLong(info_len));
        }
        let info = String::from_utf8_lossy(&bytes[HEADER_SIZE..HEADER_SIZE + info_len]);

        let mut record = Self::from_status_code(field(0)).with_info(&info);
        record.source = field(1);
        record.current_step = field(2);
        record.total_steps = field(3);
        record.current_percent = field(4);
        Ok(record)
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(f, "{}", status)?,
            None => write!(f, "status({})", self.status)?,
        }
        write!(
            f,
            " {}/{} {}%",
            self.current_step, self.total_steps, self.current_percent
        )
    }
}

//! Update Initiator
//!
//! Starts an update from a local artifact file. The file is fed to the
//! engine chunk by chunk and closed by the end-of-update callback. Failures
//! to start are reported to the display as a FAILURE progress record.


use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::channel::ProgressChannel;
use crate::core::context::RecoveryContext;
use crate::core::types::{ProgressRecord, UpdateStatus};
use crate::engine::{ChunkFeed, EndOfUpdate, EngineError, UpdateEngine, UpdateRequest};
use crate::notification::NotificationLog;

/// Info text of the FAILURE record sent when the artifact cannot be opened
pub const OPEN_FAILED: &str = "Unable to open file";

/// Info text of the FAILURE record sent when the engine refuses the update
pub const START_FAILED: &str =
    "The update engine did not accept the update request. Check the update service state.";

/// Notification logged when reading the artifact fails mid-update
pub const READ_CHUNK_FAILED: &str = "Error reading from the update file.";

/// Update initiator errors
#[derive(Debug, Error)]
pub enum InitiatorError {
    #[error("Unable to open update file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Update engine did not start the update: {0}")]
    Start(#[from] EngineError),

    #[error("An update from a local file is already running")]
    AlreadyRunning,
}

type SharedArtifact = Arc<Mutex<Option<File>>>;

pub struct UpdateInitiator {
    engine: Arc<dyn UpdateEngine>,
    log: Arc<NotificationLog>,
    channel: ProgressChannel,
    chunk_size: usize,
    artifact: SharedArtifact,
}

impl UpdateInitiator {
    pub fn new(engine: Arc<dyn UpdateEngine>, context: &RecoveryContext) -> Self {
        Self::with_parts(
            engine,
            context.log(),
            context.channel().clone(),
            context.config().update.chunk_size,
        )
    }

    pub fn with_parts(
        engine: Arc<dyn UpdateEngine>,
        log: Arc<NotificationLog>,
        channel: ProgressChannel,
        chunk_size: usize,
    ) -> Self {
        Self {
            engine,
            log,
            channel,
            chunk_size: chunk_size.max(1),
            artifact: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether an artifact file is currently held open
    pub fn artifact_open(&self) -> bool {
        self.artifact.lock().is_some()
    }

    /// Start an update from the file at `path`
    ///
    /// Starts a new notification log session. If the file cannot be opened
    /// or the engine refuses the request, a FAILURE record is sent and the
    /// error is returned; no file stays open in either case.
    pub fn start_local_update(&self, path: &Path, dry_run: bool) -> Result<(), InitiatorError> {
        if self.artifact_open() {
            tracing::warn!("Local update requested while another one is running");
            return Err(InitiatorError::AlreadyRunning);
        }

        self.log.clear();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(source) => {
                tracing::warn!("Local update: unable to open file {}: {}", path.display(), source);
                self.channel.send(&ProgressRecord::failure(OPEN_FAILED));
                return Err(InitiatorError::Open {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        *self.artifact.lock() = Some(file);

        let request = UpdateRequest::local(dry_run, self.chunk_size);
        let feed = chunk_feed(Arc::clone(&self.artifact), Arc::clone(&self.log));
        let on_end = end_of_update(Arc::clone(&self.artifact));

        if let Err(e) = self.engine.start_update(request, feed, on_end) {
            self.artifact.lock().take();
            tracing::error!("{} {}", START_FAILED, e);
            self.channel.send(&ProgressRecord::failure(START_FAILED));
            return Err(e.into());
        }

        tracing::info!("Local update started from {} (dry run: {})", path.display(), dry_run);
        Ok(())
    }
}

/// Pull callback reading the next chunk of the artifact
///
/// A read error is logged as a notification and ends the feed.
fn chunk_feed(artifact: SharedArtifact, log: Arc<NotificationLog>) -> ChunkFeed {
    Box::new(move |buf: &mut [u8]| {
        let mut guard = artifact.lock();
        let Some(file) = guard.as_mut() else {
            return 0;
        };

        loop {
            match file.read(buf) {
                Ok(len) => return len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("{} {}", READ_CHUNK_FAILED, e);
                    log.append(READ_CHUNK_FAILED);
                    return 0;
                }
            }
        }
    })
}

/// End-of-update callback: reports the outcome and closes the artifact
fn end_of_update(artifact: SharedArtifact) -> EndOfUpdate {
    Box::new(move |status: UpdateStatus| {
        if status == UpdateStatus::Success {
            tracing::info!("End of update: update was successful");
        } else {
            tracing::info!("End of update: update failed ({})", status);
        }

        if artifact.lock().take().is_some() {
            tracing::debug!("Closed update file");
        }
    })
}

//! Scripted update engine for tests
//!
//! Connections are handed out from queues of pre-connected socket ends, so
//! tests drive the monitor by writing to the peer ends. Install requests are
//! served synchronously on the caller's thread.

use std::collections::VecDeque;
use std::io;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{
    ChunkFeed, EndOfUpdate, EngineError, NotificationSource, ProgressSource, SocketNotifications,
    SocketProgress, UpdateEngine, UpdateRequest,
};
use crate::core::types::UpdateStatus;

pub(crate) struct ScriptedEngine {
    progress: Mutex<VecDeque<UnixStream>>,
    notifications: Mutex<VecDeque<UnixStream>>,
    progress_connects: AtomicUsize,
    reject_start: Mutex<Option<String>>,
    final_status: Mutex<UpdateStatus>,
    requests: Mutex<Vec<UpdateRequest>>,
    fed: Mutex<Vec<u8>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            progress: Mutex::new(VecDeque::new()),
            notifications: Mutex::new(VecDeque::new()),
            progress_connects: AtomicUsize::new(0),
            reject_start: Mutex::new(None),
            final_status: Mutex::new(UpdateStatus::Success),
            requests: Mutex::new(Vec::new()),
            fed: Mutex::new(Vec::new()),
        }
    }

    /// Queue a progress connection and return the engine-side end
    pub(crate) fn push_progress(&self) -> UnixStream {
        let (engine_end, monitor_end) = UnixStream::pair().unwrap();
        self.progress.lock().push_back(monitor_end);
        engine_end
    }

    /// Queue a notification connection and return the engine-side end
    pub(crate) fn push_notifications(&self) -> UnixStream {
        let (engine_end, monitor_end) = UnixStream::pair().unwrap();
        self.notifications.lock().push_back(monitor_end);
        engine_end
    }

    pub(crate) fn progress_connects(&self) -> usize {
        self.progress_connects.load(Ordering::SeqCst)
    }

    pub(crate) fn reject_start(&self, reason: &str) {
        *self.reject_start.lock() = Some(reason.to_string());
    }

    pub(crate) fn finish_with(&self, status: UpdateStatus) {
        *self.final_status.lock() = status;
    }

    pub(crate) fn requests(&self) -> Vec<UpdateRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn fed_bytes(&self) -> Vec<u8> {
        self.fed.lock().clone()
    }
}

fn refused() -> EngineError {
    EngineError::Connect {
        endpoint: "scripted".to_string(),
        source: io::Error::from(io::ErrorKind::ConnectionRefused),
    }
}

impl UpdateEngine for ScriptedEngine {
    fn connect_progress(&self) -> Result<Box<dyn ProgressSource>, EngineError> {
        self.progress_connects.fetch_add(1, Ordering::SeqCst);
        let stream = self.progress.lock().pop_front().ok_or_else(refused)?;
        Ok(Box::new(SocketProgress::new(stream)?))
    }

    fn connect_notifications(&self) -> Result<Box<dyn NotificationSource>, EngineError> {
        let stream = self.notifications.lock().pop_front().ok_or_else(refused)?;
        Ok(Box::new(SocketNotifications::new(stream)?))
    }

    fn start_update(
        &self,
        request: UpdateRequest,
        mut feed: ChunkFeed,
        on_end: EndOfUpdate,
    ) -> Result<(), EngineError> {
        if let Some(reason) = self.reject_start.lock().clone() {
            return Err(EngineError::Rejected(reason));
        }
        self.requests.lock().push(request);

        let mut buf = vec![0u8; request.chunk_size];
        loop {
            let len = feed(buf.as_mut_slice());
            if len == 0 {
                break;
            }
            self.fed.lock().extend_from_slice(&buf[..len]);
        }

        let status = *self.final_status.lock();
        on_end(status);
        Ok(())
    }
}

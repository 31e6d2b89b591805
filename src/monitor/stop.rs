//! Stop signalling for the monitor thread
//!
//! A socket pair lets a stop request wake the thread out of its readiness
//! wait or a backoff sleep.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Requesting side, held by whoever owns the monitor
#[derive(Debug)]
pub struct StopHandle {
    tx: UnixStream,
    requested: Arc<AtomicBool>,
}

/// Observing side, held by the monitor session
#[derive(Debug)]
pub struct StopSignal {
    rx: UnixStream,
    requested: Arc<AtomicBool>,
}

/// Create a connected stop handle/signal pair
pub fn stop_channel() -> io::Result<(StopHandle, StopSignal)> {
    let (tx, rx) = UnixStream::pair()?;
    let requested = Arc::new(AtomicBool::new(false));
    Ok((
        StopHandle {
            tx,
            requested: Arc::clone(&requested),
        },
        StopSignal { rx, requested },
    ))
}

impl StopHandle {
    /// Request a stop; repeated requests are no-ops
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            if let Err(e) = (&self.tx).write_all(&[1]) {
                tracing::warn!("Failed to wake monitor thread: {}", e);
            }
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl StopSignal {
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `timeout` unless a stop is requested first
    ///
    /// Returns `true` if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_requested() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }

            let mut fds = [PollFd::new(self.rx.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, poll_timeout(remaining)) {
                // a written wake byte or a dropped handle
                Ok(n) if n > 0 => return true,
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    tracing::warn!("Stop wait failed, sleeping instead: {}", e);
                    std::thread::sleep(remaining);
                }
            }
        }
    }
}

impl AsFd for StopSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }
}

/// Poll timeout for a duration, capped at the largest finite value
pub(crate) fn poll_timeout(duration: Duration) -> PollTimeout {
    let millis = duration.as_millis().min(u128::from(u16::MAX));
    PollTimeout::from(millis as u16)
}

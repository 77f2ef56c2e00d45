//! I/O service shared by every live connection of one process.
//!
//! The service owns (or borrows) a tokio runtime and allows a single
//! connection attempt at a time. An attempt lasts from `connect` until the
//! engine reaches `Closed`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::LiveClientError;

enum RuntimeSource {
    Owned(Runtime),
    Borrowed(Handle),
}

struct TransportInner {
    runtime: RuntimeSource,
    attempt_active: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct TransportService {
    inner: Arc<TransportInner>,
}

impl TransportService {
    /// Builds a small dedicated runtime for network I/O.
    pub fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("livemap-net")
            .enable_all()
            .build()?;
        Ok(Self::with_source(RuntimeSource::Owned(runtime)))
    }

    /// Runs connections on an existing runtime.
    pub fn from_handle(handle: Handle) -> Self {
        Self::with_source(RuntimeSource::Borrowed(handle))
    }

    fn with_source(runtime: RuntimeSource) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                runtime,
                attempt_active: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn handle(&self) -> &Handle {
        match &self.inner.runtime {
            RuntimeSource::Owned(rt) => rt.handle(),
            RuntimeSource::Borrowed(handle) => handle,
        }
    }

    pub fn is_attempt_in_progress(&self) -> bool {
        self.inner.attempt_active.load(Ordering::Acquire)
    }

    /// Claims the service for a new attempt.
    pub fn try_begin_attempt(&self) -> Result<AttemptGuard, LiveClientError> {
        self.inner
            .attempt_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LiveClientError::AlreadyConnecting)?;
        Ok(AttemptGuard {
            active: Arc::clone(&self.inner.attempt_active),
        })
    }
}

/// Releases the attempt slot when dropped.
///
/// Does not keep the transport's runtime alive.
#[derive(Debug)]
pub struct AttemptGuard {
    active: Arc<AtomicBool>,
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_attempt_at_a_time() {
        let transport = TransportService::from_handle(Handle::current());
        let guard = transport.try_begin_attempt().unwrap();
        assert!(transport.is_attempt_in_progress());
        assert!(matches!(
            transport.try_begin_attempt(),
            Err(LiveClientError::AlreadyConnecting)
        ));

        drop(guard);
        assert!(!transport.is_attempt_in_progress());
        assert!(transport.try_begin_attempt().is_ok());
    }

    #[tokio::test]
    async fn clones_share_the_attempt_slot() {
        let transport = TransportService::from_handle(Handle::current());
        let other = transport.clone();
        let _guard = transport.try_begin_attempt().unwrap();
        assert!(other.is_attempt_in_progress());
        assert!(other.try_begin_attempt().is_err());
    }
}

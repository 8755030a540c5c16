//! The single refresh timer.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A pending refresh, aborted when dropped.
///
/// The engine keeps at most one of these; replacing or clearing the slot
/// cancels the previous timer.
#[derive(Debug)]
pub(crate) struct RefreshTimer {
    generation: u64,
    fires_at: Instant,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    /// Run `on_fire` once `delay` has elapsed, unless the timer is dropped first.
    pub(crate) fn arm<F>(generation: u64, delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let fires_at = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(fires_at).await;
            on_fire.await;
        });
        Self {
            generation,
            fires_at,
            handle,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn fires_at(&self) -> Instant {
        self.fires_at
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

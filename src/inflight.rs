//! Bookkeeping for background fetch-poll tasks. Every spawned poll registers
//! its abort handle here keyed by the destination channel, and unregisters
//! through a drop guard when it reaches a terminal state, so no poll task
//! outlives the process's knowledge of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::AbortHandle;

#[derive(Default)]
pub struct InflightJobs {
    next_id: AtomicU64,
    inner: Mutex<HashMap<u64, HashMap<u64, AbortHandle>>>,
}

impl InflightJobs {
    pub fn register(self: &Arc<Self>, channel_id: u64, handle: AbortHandle) -> InflightJobGuard {
        let entry_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.lock().expect("inflight jobs lock poisoned");
        inner.entry(channel_id).or_default().insert(entry_id, handle);
        InflightJobGuard {
            jobs: self.clone(),
            channel_id,
            entry_id,
        }
    }

    /// Abort every poll task targeting the given channel. Returns how many
    /// were aborted.
    pub fn abort_channel(&self, channel_id: u64) -> usize {
        let handles = {
            let mut inner = self.inner.lock().expect("inflight jobs lock poisoned");
            inner
                .remove(&channel_id)
                .map(|jobs| jobs.into_values().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        for handle in &handles {
            handle.abort();
        }
        handles.len()
    }

    /// Number of poll tasks currently registered for a channel.
    pub fn active(&self, channel_id: u64) -> usize {
        let inner = self.inner.lock().expect("inflight jobs lock poisoned");
        inner.get(&channel_id).map(HashMap::len).unwrap_or(0)
    }

    fn unregister(&self, channel_id: u64, entry_id: u64) {
        let mut inner = self.inner.lock().expect("inflight jobs lock poisoned");
        if let Some(jobs) = inner.get_mut(&channel_id) {
            jobs.remove(&entry_id);
            if jobs.is_empty() {
                inner.remove(&channel_id);
            }
        }
    }
}

pub struct InflightJobGuard {
    jobs: Arc<InflightJobs>,
    channel_id: u64,
    entry_id: u64,
}

impl Drop for InflightJobGuard {
    fn drop(&mut self) {
        self.jobs.unregister(self.channel_id, self.entry_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::{AbortHandle, Abortable, Aborted};

    #[test]
    fn guard_unregisters_on_drop() {
        let jobs = Arc::new(InflightJobs::default());
        let (handle, _reg) = AbortHandle::new_pair();
        let guard = jobs.register(7, handle);
        assert_eq!(jobs.active(7), 1);
        drop(guard);
        assert_eq!(jobs.active(7), 0);
    }

    #[tokio::test]
    async fn abort_channel_cancels_registered_tasks() {
        let jobs = Arc::new(InflightJobs::default());
        let (handle, registration) = AbortHandle::new_pair();
        let _guard = jobs.register(9, handle);

        let task = Abortable::new(std::future::pending::<()>(), registration);
        assert_eq!(jobs.abort_channel(9), 1);
        assert_eq!(task.await, Err(Aborted));
        assert_eq!(jobs.active(9), 0);
    }

    #[test]
    fn channels_are_independent() {
        let jobs = Arc::new(InflightJobs::default());
        let (h1, _r1) = AbortHandle::new_pair();
        let (h2, _r2) = AbortHandle::new_pair();
        let _g1 = jobs.register(1, h1);
        let _g2 = jobs.register(2, h2);
        assert_eq!(jobs.abort_channel(1), 1);
        assert_eq!(jobs.active(2), 1);
    }
}

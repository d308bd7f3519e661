use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::device::{EyeTracker, SubscriptionId};
use crate::types::{GazeSample, StreamKind};

/// About five minutes of gaze at 600 Hz.
pub const DEFAULT_CAPACITY: usize = 200_000;

/// Buffering engine over one device: per-stream start/stop/clear, peek
/// (non-destructive) and consume (destructive drain).
///
/// The append path runs on the driver thread concurrently with peek/consume
/// from the dispatch side; each stream's queue sits behind its own mutex.
/// Capacity is bounded, dropping the oldest sample on overflow, so an
/// undrained buffer cannot grow without limit.
#[derive(Clone)]
pub struct SampleStore {
    device: Arc<dyn EyeTracker>,
    inner: Arc<StoreInner>,
}

struct StoreInner {
    capacity: usize,
    gaze: Mutex<VecDeque<GazeSample>>,
    gaze_sub: Mutex<Option<SubscriptionId>>,
}

impl SampleStore {
    pub fn new(device: Arc<dyn EyeTracker>) -> Self {
        Self::with_capacity(device, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(device: Arc<dyn EyeTracker>, capacity: usize) -> Self {
        Self {
            device,
            inner: Arc::new(StoreInner {
                capacity: capacity.max(1),
                gaze: Mutex::new(VecDeque::new()),
                gaze_sub: Mutex::new(None),
            }),
        }
    }

    /// Start buffering a stream. Returns true when buffering is active,
    /// including when it already was.
    pub fn start(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Gaze => {
                let mut sub = self.inner.gaze_sub.lock();
                if sub.is_some() {
                    return true;
                }
                let inner = self.inner.clone();
                let handler = Arc::new(move |sample: &GazeSample| inner.append_gaze(*sample));
                match self.device.subscribe_gaze(handler) {
                    Ok(id) => {
                        *sub = Some(id);
                        true
                    }
                    Err(e) => {
                        warn!("failed to start gaze buffering: {e}");
                        false
                    }
                }
            }
        }
    }

    /// Stop buffering a stream. Returns true when buffering is stopped,
    /// including when it never ran.
    pub fn stop(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Gaze => {
                let taken = self.inner.gaze_sub.lock().take();
                match taken {
                    Some(id) => match self.device.unsubscribe_gaze(id) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("failed to stop gaze buffering: {e}");
                            false
                        }
                    },
                    None => true,
                }
            }
        }
    }

    /// Drop all buffered samples for a stream.
    pub fn clear(&self, kind: StreamKind) {
        match kind {
            StreamKind::Gaze => self.inner.gaze.lock().clear(),
        }
    }

    /// Up to the `n` most-recent samples, oldest first, without removing
    /// them. All buffered samples when `n` is None.
    pub fn peek(&self, kind: StreamKind, n: Option<usize>) -> Vec<GazeSample> {
        match kind {
            StreamKind::Gaze => {
                let queue = self.inner.gaze.lock();
                let skip = n.map_or(0, |n| queue.len().saturating_sub(n));
                queue.iter().skip(skip).copied().collect()
            }
        }
    }

    /// Atomically drain up to `n` samples, oldest first. All buffered
    /// samples when `n` is None.
    pub fn consume(&self, kind: StreamKind, n: Option<usize>) -> Vec<GazeSample> {
        match kind {
            StreamKind::Gaze => {
                let mut queue = self.inner.gaze.lock();
                let take = n.map_or(queue.len(), |n| n.min(queue.len()));
                queue.drain(..take).collect()
            }
        }
    }

    pub fn len(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Gaze => self.inner.gaze.lock().len(),
        }
    }

    pub fn is_empty(&self, kind: StreamKind) -> bool {
        self.len(kind) == 0
    }
}

impl StoreInner {
    fn append_gaze(&self, sample: GazeSample) {
        let mut queue = self.gaze.lock();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedTracker;
    use crate::types::EyeGaze;
    use std::thread;
    use std::time::Duration;

    fn store() -> SampleStore {
        let device = Arc::new(SimulatedTracker::new(600.0).unwrap());
        SampleStore::new(device)
    }

    fn sample(ts: i64) -> GazeSample {
        GazeSample {
            system_time_us: ts,
            left: EyeGaze::valid(0.5, 0.5),
            right: EyeGaze::valid(0.5, 0.5),
        }
    }

    #[test]
    fn peek_is_non_destructive() {
        let store = store();
        for ts in 0..5 {
            store.inner.append_gaze(sample(ts));
        }

        let first = store.peek(StreamKind::Gaze, None);
        let second = store.peek(StreamKind::Gaze, None);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn peek_returns_most_recent_oldest_first() {
        let store = store();
        for ts in 0..10 {
            store.inner.append_gaze(sample(ts));
        }

        let last3 = store.peek(StreamKind::Gaze, Some(3));
        let stamps: Vec<i64> = last3.iter().map(|s| s.system_time_us).collect();
        assert_eq!(stamps, vec![7, 8, 9]);

        // asking for more than is buffered returns everything
        assert_eq!(store.peek(StreamKind::Gaze, Some(100)).len(), 10);
    }

    #[test]
    fn consume_drains_oldest_first() {
        let store = store();
        for ts in 0..6 {
            store.inner.append_gaze(sample(ts));
        }

        let drained = store.consume(StreamKind::Gaze, Some(2));
        assert_eq!(
            drained.iter().map(|s| s.system_time_us).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(store.len(StreamKind::Gaze), 4);

        let rest = store.consume(StreamKind::Gaze, None);
        assert_eq!(rest.len(), 4);
        assert!(store.is_empty(StreamKind::Gaze));
    }

    #[test]
    fn clear_is_idempotent() {
        let store = store();
        store.clear(StreamKind::Gaze);
        store.inner.append_gaze(sample(1));
        store.clear(StreamKind::Gaze);
        store.clear(StreamKind::Gaze);
        assert!(store.is_empty(StreamKind::Gaze));
    }

    #[test]
    fn capacity_drops_oldest() {
        let device = Arc::new(SimulatedTracker::new(600.0).unwrap());
        let store = SampleStore::with_capacity(device, 3);
        for ts in 0..5 {
            store.inner.append_gaze(sample(ts));
        }

        let stamps: Vec<i64> = store
            .peek(StreamKind::Gaze, None)
            .iter()
            .map(|s| s.system_time_us)
            .collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[test]
    fn start_stop_against_device() {
        let store = store();
        assert!(store.start(StreamKind::Gaze));
        // starting again while active is still a success
        assert!(store.start(StreamKind::Gaze));

        thread::sleep(Duration::from_millis(100));
        assert!(!store.is_empty(StreamKind::Gaze));

        assert!(store.stop(StreamKind::Gaze));
        thread::sleep(Duration::from_millis(50));
        let settled = store.len(StreamKind::Gaze);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(store.len(StreamKind::Gaze), settled);

        // stopping a stopped stream is still a success
        assert!(store.stop(StreamKind::Gaze));
    }
}

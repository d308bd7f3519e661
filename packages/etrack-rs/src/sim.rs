use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::device::{EyeTracker, GazeHandler, SubscriptionId, TrackerFinder};
use crate::error::{Result, TrackerError, TrackerStatus};
use crate::types::{EyeGaze, GazeSample, TrackerInfo};

/// Output frequencies the simulated device can be programmed to.
pub const SUPPORTED_FREQUENCIES: [f32; 4] = [60.0, 120.0, 300.0, 600.0];

/// Simulated eye tracker used for development and tests.
///
/// A worker thread synthesizes gaze samples at the programmed output
/// frequency and fans them out to all current subscribers, mirroring how a
/// real driver delivers callbacks on its own thread. The thread parks while
/// no subscriber is registered and exits once the tracker is dropped.
pub struct SimulatedTracker {
    inner: Arc<SimInner>,
}

struct SimInner {
    info: TrackerInfo,
    state: Mutex<SimState>,
    wake: Condvar,
    next_id: AtomicU64,
}

struct SimState {
    freq: f32,
    subscribers: HashMap<u64, GazeHandler>,
    worker_spawned: bool,
}

impl SimulatedTracker {
    /// Create a simulated tracker programmed to `start_freq`, which must be
    /// one of `SUPPORTED_FREQUENCIES`.
    pub fn new(start_freq: f32) -> Result<Self> {
        if !is_supported(start_freq) {
            return Err(TrackerError::device(
                TrackerStatus::InvalidParameter,
                format!("frequency {start_freq} is not supported by the simulated tracker"),
            ));
        }
        Ok(Self {
            inner: Arc::new(SimInner {
                info: TrackerInfo {
                    model: "Simulated Spectrum".to_string(),
                    serial_number: "ETRK-SIM-001".to_string(),
                    address: "etrack://simulated".to_string(),
                },
                state: Mutex::new(SimState {
                    freq: start_freq,
                    subscribers: HashMap::new(),
                    worker_spawned: false,
                }),
                wake: Condvar::new(),
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

fn is_supported(freq: f32) -> bool {
    SUPPORTED_FREQUENCIES.iter().any(|s| (s - freq).abs() < 0.01)
}

/// Deterministic gaze trajectory: a slow circle around screen center, both
/// eyes valid and coincident.
fn synth_sample(clock_us: i64, n: u64) -> GazeSample {
    let t = n as f32 * 0.01;
    let x = 0.5 + 0.35 * t.sin();
    let y = 0.5 + 0.35 * t.cos();
    GazeSample {
        system_time_us: clock_us,
        left: EyeGaze::valid(x, y),
        right: EyeGaze::valid(x, y),
    }
}

fn spawn_worker(inner: &Arc<SimInner>) {
    let weak: Weak<SimInner> = Arc::downgrade(inner);
    let _ = thread::Builder::new()
        .name("etrack-sim".to_string())
        .spawn(move || {
            let mut clock_us: i64 = 0;
            let mut n: u64 = 0;
            loop {
                let Some(inner) = weak.upgrade() else { return };
                let (handlers, period) = {
                    let mut state = inner.state.lock();
                    if state.subscribers.is_empty() {
                        // Park until someone subscribes; wake periodically so
                        // the thread can notice the tracker itself is gone.
                        let _ = inner
                            .wake
                            .wait_for(&mut state, Duration::from_millis(200));
                        if state.subscribers.is_empty() {
                            continue;
                        }
                    }
                    let handlers: Vec<GazeHandler> =
                        state.subscribers.values().cloned().collect();
                    let period = Duration::from_secs_f64(1.0 / state.freq as f64);
                    (handlers, period)
                };
                drop(inner);
                n += 1;
                clock_us += period.as_micros() as i64;
                let sample = synth_sample(clock_us, n);
                for handler in &handlers {
                    handler(&sample);
                }
                thread::sleep(period);
            }
        });
}

impl EyeTracker for SimulatedTracker {
    fn info(&self) -> TrackerInfo {
        self.inner.info.clone()
    }

    fn supported_frequencies(&self) -> Result<Vec<f32>> {
        Ok(SUPPORTED_FREQUENCIES.to_vec())
    }

    fn output_frequency(&self) -> Result<f32> {
        Ok(self.inner.state.lock().freq)
    }

    fn set_output_frequency(&self, freq: f32) -> Result<()> {
        if !is_supported(freq) {
            return Err(TrackerError::device(
                TrackerStatus::InvalidParameter,
                format!("frequency {freq} is not supported by the simulated tracker"),
            ));
        }
        self.inner.state.lock().freq = freq;
        debug!(freq, "simulated tracker output frequency set");
        Ok(())
    }

    fn apply_license(&self, license: &[u8]) -> Result<()> {
        if license.is_empty() {
            return Err(TrackerError::device(
                TrackerStatus::LicenseError,
                "license blob is empty",
            ));
        }
        Ok(())
    }

    fn subscribe_gaze(&self, handler: GazeHandler) -> Result<SubscriptionId> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.inner.state.lock();
            state.subscribers.insert(id, handler);
            if !state.worker_spawned {
                spawn_worker(&self.inner);
                state.worker_spawned = true;
            }
        }
        self.inner.wake.notify_one();
        Ok(SubscriptionId(id))
    }

    fn unsubscribe_gaze(&self, id: SubscriptionId) -> Result<()> {
        self.inner.state.lock().subscribers.remove(&id.0);
        Ok(())
    }
}

/// Finder yielding a single shared simulated tracker.
pub struct SimulatedFinder {
    trackers: Vec<Arc<SimulatedTracker>>,
}

impl SimulatedFinder {
    pub fn with_start_frequency(freq: f32) -> Result<Self> {
        Ok(Self {
            trackers: vec![Arc::new(SimulatedTracker::new(freq)?)],
        })
    }

    /// A finder that discovers nothing, for exercising enumeration failures.
    pub fn empty() -> Self {
        Self { trackers: Vec::new() }
    }
}

impl TrackerFinder for SimulatedFinder {
    fn discover(&self) -> Result<Vec<Arc<dyn EyeTracker>>> {
        Ok(self
            .trackers
            .iter()
            .map(|t| t.clone() as Arc<dyn EyeTracker>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn rejects_unsupported_frequency() {
        let tracker = SimulatedTracker::new(600.0).unwrap();
        let err = tracker.set_output_frequency(100.0).unwrap_err();
        assert_eq!(err.status(), TrackerStatus::InvalidParameter);
        assert_eq!(tracker.output_frequency().unwrap(), 600.0);
    }

    #[test]
    fn rejects_empty_license() {
        let tracker = SimulatedTracker::new(600.0).unwrap();
        assert_eq!(
            tracker.apply_license(b"").unwrap_err().status(),
            TrackerStatus::LicenseError
        );
        assert!(tracker.apply_license(b"valid-blob").is_ok());
    }

    #[test]
    fn delivers_samples_to_subscriber() {
        let tracker = SimulatedTracker::new(600.0).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = tracker
            .subscribe_gaze(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(count.load(Ordering::Relaxed) > 0);

        tracker.unsubscribe_gaze(id).unwrap();
        thread::sleep(Duration::from_millis(50));
        let settled = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::Relaxed), settled);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let tracker = SimulatedTracker::new(600.0).unwrap();
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let sink = stamps.clone();
        let id = tracker
            .subscribe_gaze(Arc::new(move |s| sink.lock().push(s.system_time_us)))
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        tracker.unsubscribe_gaze(id).unwrap();

        let stamps = stamps.lock();
        assert!(stamps.len() > 1);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_finder_discovers_nothing() {
        assert!(SimulatedFinder::empty().discover().unwrap().is_empty());
    }
}

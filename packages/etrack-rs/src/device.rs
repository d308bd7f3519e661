use std::sync::Arc;

use crate::error::Result;
use crate::types::{GazeSample, TrackerInfo};

/// Handler invoked for every raw gaze sample, on the driver's own thread,
/// concurrently with whatever else the process is doing. Keep it cheap and
/// never block in it.
pub type GazeHandler = Arc<dyn Fn(&GazeSample) + Send + Sync>;

/// Opaque token identifying one gaze subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Contract over one physical (or simulated) eye tracker.
///
/// Calls are synchronous and assumed fast and non-cancellable; if the
/// underlying SDK hangs, the caller hangs with it. No timeout is imposed.
pub trait EyeTracker: Send + Sync {
    /// Identity triple reported to clients on connect.
    fn info(&self) -> TrackerInfo;

    /// Output frequencies this device can be programmed to.
    fn supported_frequencies(&self) -> Result<Vec<f32>>;

    /// The frequency currently programmed into the device.
    fn output_frequency(&self) -> Result<f32>;

    /// Program the device output frequency. Must be one of
    /// `supported_frequencies`.
    fn set_output_frequency(&self, freq: f32) -> Result<()>;

    /// Apply a license blob to the device.
    fn apply_license(&self, license: &[u8]) -> Result<()>;

    /// Register a raw-sample handler. Multiple subscriptions may be active
    /// at once; each gets every raw sample.
    fn subscribe_gaze(&self, handler: GazeHandler) -> Result<SubscriptionId>;

    /// Drop a subscription. Unknown ids are a no-op success.
    fn unsubscribe_gaze(&self, id: SubscriptionId) -> Result<()>;
}

/// Enumerates reachable trackers.
pub trait TrackerFinder: Send + Sync {
    fn discover(&self) -> Result<Vec<Arc<dyn EyeTracker>>>;
}

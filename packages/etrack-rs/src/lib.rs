pub mod buffer;
pub mod device;
pub mod error;
pub mod sim;
pub mod types;

pub use buffer::SampleStore;
pub use device::{EyeTracker, GazeHandler, SubscriptionId, TrackerFinder};
pub use error::{Result, TrackerError, TrackerStatus};
pub use sim::{SimulatedFinder, SimulatedTracker};
pub use types::{EyeGaze, GazeSample, StreamKind, TrackerInfo};

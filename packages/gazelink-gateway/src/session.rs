use std::path::Path;
use std::sync::Arc;

use etrack_rs::{
    EyeTracker, GazeHandler, SampleStore, StreamKind, SubscriptionId, TrackerError, TrackerFinder,
    TrackerInfo, TrackerStatus,
};
use tracing::{debug, info, warn};

use crate::downsample::DownsampleGate;
use crate::negotiate::{negotiate, Negotiated};

/// Stream-frequency configuration state machine.
///
/// `startSampleStream` is only legal in `Configured`; programming the base
/// frequency directly drops the session back to `Unconfigured` because the
/// negotiated factor may no longer hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamConfig {
    Unconfigured,
    Configured { base: f32, factor: u32 },
}

/// Errors surfaced by session operations. The dispatcher maps these onto
/// the wire error taxonomy; the session itself knows nothing about JSON.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{context}")]
    Device {
        status: TrackerStatus,
        context: String,
    },

    #[error("no supported frequency is compatible with the request")]
    NoCompatibleFrequency { pinned_base: Option<f32> },

    #[error("stream frequency has not been configured")]
    FrequencyNotConfigured,

    #[error("no device connected")]
    NotConnected,
}

impl SessionError {
    fn device(status: TrackerStatus, context: impl Into<String>) -> Self {
        Self::Device {
            status,
            context: context.into(),
        }
    }

    fn from_tracker(err: TrackerError, context: &str) -> Self {
        Self::Device {
            status: err.status(),
            context: context.to_string(),
        }
    }
}

/// The process-wide association between one device handle, its configured
/// frequency state and its sample buffer.
///
/// One instance exists per gateway, behind an async mutex: command handlers
/// lock it for their whole duration, which serializes dispatch exactly like
/// the single event loop this protocol was designed around. The driver-side
/// sample path never touches the session; it works through the shared
/// `DownsampleGate` and the client registry.
pub struct TrackerSession {
    finder: Arc<dyn TrackerFinder>,
    device: Option<Arc<dyn EyeTracker>>,
    pinned_base_freq: Option<f32>,
    stream: StreamConfig,
    stream_sub: Option<SubscriptionId>,
    store: Option<SampleStore>,
    gate: Arc<DownsampleGate>,
}

impl TrackerSession {
    pub fn new(finder: Arc<dyn TrackerFinder>, gate: Arc<DownsampleGate>) -> Self {
        Self {
            finder,
            device: None,
            pinned_base_freq: None,
            stream: StreamConfig::Unconfigured,
            stream_sub: None,
            store: None,
            gate,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        self.stream
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_sub.is_some()
    }

    pub fn pinned_base_freq(&self) -> Option<f32> {
        self.pinned_base_freq
    }

    fn require_device(&self, context: &str) -> Result<Arc<dyn EyeTracker>, SessionError> {
        self.device
            .clone()
            .ok_or_else(|| SessionError::device(TrackerStatus::NotConnected, context))
    }

    /// Discover a device if none is held yet, apply the license file when
    /// one exists at `license_file`, and report the device identity.
    pub fn connect(&mut self, license_file: &Path) -> Result<TrackerInfo, SessionError> {
        if self.device.is_none() {
            let mut found = self
                .finder
                .discover()
                .map_err(|e| SessionError::from_tracker(e, "Problem finding eye tracker"))?;
            if found.is_empty() {
                return Err(SessionError::device(
                    TrackerStatus::NoTrackerFound,
                    "Problem finding eye tracker",
                ));
            }
            let tracker = found.remove(0);
            let identity = tracker.info();
            info!(
                model = %identity.model,
                serial = %identity.serial_number,
                "acquired eye tracker"
            );
            self.device = Some(tracker);
        }

        let device = self.require_device("Problem finding eye tracker")?;

        if license_file.exists() {
            let blob = std::fs::read(license_file).map_err(|e| {
                SessionError::device(
                    TrackerStatus::LicenseError,
                    format!(
                        "License file {} found, but could not be read: {e}",
                        license_file.display()
                    ),
                )
            })?;
            device.apply_license(&blob).map_err(|e| {
                SessionError::from_tracker(
                    e,
                    &format!(
                        "License file {} found, but could not be applied",
                        license_file.display()
                    ),
                )
            })?;
            info!(path = %license_file.display(), "license applied");
        }

        Ok(device.info())
    }

    /// Negotiate the requested stream frequency against the supported set
    /// (or the pinned base), program the device, and arm the gate.
    pub fn set_stream_freq(&mut self, requested: f32) -> Result<Negotiated, SessionError> {
        let device = self.require_device("Problem getting sampling frequencies")?;

        let supported = match self.pinned_base_freq {
            Some(base) => vec![base],
            None => device
                .supported_frequencies()
                .map_err(|e| SessionError::from_tracker(e, "Problem getting sampling frequencies"))?,
        };

        let chosen = negotiate(requested, &supported).ok_or(SessionError::NoCompatibleFrequency {
            pinned_base: self.pinned_base_freq,
        })?;

        device
            .set_output_frequency(chosen.base)
            .map_err(|e| SessionError::from_tracker(e, "Problem setting sampling frequency"))?;

        self.gate.configure(chosen.factor);
        self.stream = StreamConfig::Configured {
            base: chosen.base,
            factor: chosen.factor,
        };
        debug!(
            base = chosen.base,
            factor = chosen.factor,
            achieved = chosen.achieved(),
            "stream frequency configured"
        );
        Ok(chosen)
    }

    /// Subscribe the broadcast pipeline to raw device samples.
    pub fn start_stream(&mut self, pipeline: GazeHandler) -> Result<(), SessionError> {
        if !matches!(self.stream, StreamConfig::Configured { .. }) {
            return Err(SessionError::FrequencyNotConfigured);
        }
        let device = self.require_device("Problem subscribing to gaze data")?;

        // one pipeline at a time
        if let Some(prev) = self.stream_sub.take() {
            let _ = device.unsubscribe_gaze(prev);
        }

        let id = device
            .subscribe_gaze(pipeline)
            .map_err(|e| SessionError::from_tracker(e, "Problem subscribing to gaze data"))?;
        self.stream_sub = Some(id);
        info!("sample stream started");
        Ok(())
    }

    /// Unsubscribe the broadcast pipeline; success when no stream is active.
    pub fn stop_stream(&mut self) -> Result<(), SessionError> {
        if let Some(id) = self.stream_sub.take() {
            let device = self.require_device("Problem unsubscribing from gaze data")?;
            device
                .unsubscribe_gaze(id)
                .map_err(|e| SessionError::from_tracker(e, "Problem unsubscribing from gaze data"))?;
            info!("sample stream stopped");
        }
        Ok(())
    }

    /// Program the device frequency directly, bypassing negotiation. Pins
    /// the base for later negotiations, invalidates the configured state and
    /// tears down any active stream.
    pub fn set_base_freq(&mut self, freq: f32) -> Result<(), SessionError> {
        let device = self.require_device("Problem setting sampling frequency")?;
        device
            .set_output_frequency(freq)
            .map_err(|e| SessionError::from_tracker(e, "Problem setting sampling frequency"))?;

        self.pinned_base_freq = Some(freq);
        self.stream = StreamConfig::Unconfigured;
        if let Some(id) = self.stream_sub.take() {
            let _ = device.unsubscribe_gaze(id);
        }
        info!(freq, "base sample frequency pinned");
        Ok(())
    }

    /// Start buffering gaze samples, creating the store on first use.
    pub fn start_buffer(&mut self) -> Result<bool, SessionError> {
        let device = match &self.device {
            Some(device) => device.clone(),
            None => return Err(SessionError::NotConnected),
        };
        let store = self
            .store
            .get_or_insert_with(|| SampleStore::new(device));
        Ok(store.start(StreamKind::Gaze))
    }

    /// Clear buffered samples; nothing to clear is not an error.
    pub fn clear_buffer(&self) {
        if let Some(store) = &self.store {
            store.clear(StreamKind::Gaze);
        }
    }

    /// Up to `n` most-recent buffered samples; empty when no buffer exists.
    pub fn peek_samples(&self, n: Option<usize>) -> Vec<etrack_rs::GazeSample> {
        self.store
            .as_ref()
            .map(|store| store.peek(StreamKind::Gaze, n))
            .unwrap_or_default()
    }

    /// Stop buffering; success when no buffer was ever started.
    pub fn stop_buffer(&self) -> bool {
        self.store
            .as_ref()
            .map(|store| store.stop(StreamKind::Gaze))
            .unwrap_or(true)
    }

    /// Drain everything the buffer holds.
    pub fn consume_all(&self) -> Vec<etrack_rs::GazeSample> {
        self.store
            .as_ref()
            .map(|store| store.consume(StreamKind::Gaze, None))
            .unwrap_or_default()
    }

    /// Last-disconnect teardown: unsubscribe the stream and stop buffering,
    /// both idempotent, so no device load persists with zero observers.
    pub fn quiesce(&mut self) {
        if let Some(device) = &self.device {
            if let Some(id) = self.stream_sub.take() {
                if let Err(e) = device.unsubscribe_gaze(id) {
                    warn!("failed to unsubscribe stream during teardown: {e}");
                }
            }
        }
        if let Some(store) = &self.store {
            store.stop(StreamKind::Gaze);
        }
        debug!("session quiesced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etrack_rs::SimulatedFinder;
    use std::path::PathBuf;

    fn session() -> TrackerSession {
        let finder = Arc::new(SimulatedFinder::with_start_frequency(600.0).unwrap());
        TrackerSession::new(finder, Arc::new(DownsampleGate::new()))
    }

    fn no_license() -> PathBuf {
        PathBuf::from("/nonexistent/license/file")
    }

    #[test]
    fn connect_reports_identity() {
        let mut session = session();
        let info = session.connect(&no_license()).unwrap();
        assert_eq!(info.model, "Simulated Spectrum");

        // connecting again reuses the held device
        let again = session.connect(&no_license()).unwrap();
        assert_eq!(again.serial_number, info.serial_number);
    }

    #[test]
    fn connect_fails_when_nothing_is_discovered() {
        let mut session =
            TrackerSession::new(Arc::new(SimulatedFinder::empty()), Arc::new(DownsampleGate::new()));
        match session.connect(&no_license()).unwrap_err() {
            SessionError::Device { status, .. } => {
                assert_eq!(status, TrackerStatus::NoTrackerFound)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stream_requires_configuration_first() {
        let mut session = session();
        session.connect(&no_license()).unwrap();

        let err = session
            .start_stream(Arc::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, SessionError::FrequencyNotConfigured));
        assert!(!session.is_streaming());
    }

    #[test]
    fn negotiation_configures_gate_and_state() {
        let mut session = session();
        session.connect(&no_license()).unwrap();

        let chosen = session.set_stream_freq(30.0).unwrap();
        assert_eq!(chosen.base, 60.0);
        assert_eq!(chosen.factor, 2);
        assert_eq!(
            session.stream_config(),
            StreamConfig::Configured {
                base: 60.0,
                factor: 2
            }
        );

        session.start_stream(Arc::new(|_| {})).unwrap();
        assert!(session.is_streaming());
        session.stop_stream().unwrap();
        assert!(!session.is_streaming());
    }

    #[test]
    fn pinning_base_invalidates_configuration_and_stops_stream() {
        let mut session = session();
        session.connect(&no_license()).unwrap();
        session.set_stream_freq(60.0).unwrap();
        session.start_stream(Arc::new(|_| {})).unwrap();

        session.set_base_freq(120.0).unwrap();
        assert_eq!(session.stream_config(), StreamConfig::Unconfigured);
        assert!(!session.is_streaming());
        assert_eq!(session.pinned_base_freq(), Some(120.0));

        // negotiation is now restricted to the pinned base
        let err = session.set_stream_freq(50.0).unwrap_err();
        match err {
            SessionError::NoCompatibleFrequency { pinned_base } => {
                assert_eq!(pinned_base, Some(120.0))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let chosen = session.set_stream_freq(60.0).unwrap();
        assert_eq!(chosen.base, 120.0);
        assert_eq!(chosen.factor, 2);
    }

    #[test]
    fn buffer_requires_a_connected_device() {
        let mut session = session();
        assert!(matches!(
            session.start_buffer().unwrap_err(),
            SessionError::NotConnected
        ));

        session.connect(&no_license()).unwrap();
        assert!(session.start_buffer().unwrap());
        assert!(session.stop_buffer());
    }

    #[test]
    fn buffer_operations_tolerate_missing_buffer() {
        let session = session();
        session.clear_buffer();
        assert!(session.peek_samples(None).is_empty());
        assert!(session.stop_buffer());
        assert!(session.consume_all().is_empty());
    }

    #[test]
    fn quiesce_is_idempotent() {
        let mut session = session();
        session.connect(&no_license()).unwrap();
        session.set_stream_freq(120.0).unwrap();
        session.start_stream(Arc::new(|_| {})).unwrap();
        session.start_buffer().unwrap();

        session.quiesce();
        assert!(!session.is_streaming());
        session.quiesce();
        session.quiesce();
    }

    #[test]
    fn device_errors_carry_context() {
        let mut session = session();
        session.connect(&no_license()).unwrap();

        // pin to a frequency the simulated device rejects
        let err = session.set_base_freq(97.0).unwrap_err();
        match err {
            SessionError::Device { status, context } => {
                assert_eq!(status, TrackerStatus::InvalidParameter);
                assert_eq!(context, "Problem setting sampling frequency");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

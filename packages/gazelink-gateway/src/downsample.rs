use std::sync::atomic::{AtomicU32, Ordering};

/// Tick gate realizing the negotiated downsample factor.
///
/// Every factor-th raw sample is admitted, the rest are dropped; there is no
/// buffering or interpolation. The tick is kept reduced modulo the factor so
/// it never grows without bound. Both fields are atomics because `admit`
/// runs on the driver thread while `configure` runs on the dispatch side; a
/// sample racing a reconfigure may be gated by the old phase for one tick,
/// which is within the protocol's tolerance since reconfiguration restarts
/// the phase anyway.
#[derive(Debug)]
pub struct DownsampleGate {
    factor: AtomicU32,
    tick: AtomicU32,
}

impl DownsampleGate {
    pub fn new() -> Self {
        Self {
            factor: AtomicU32::new(1),
            tick: AtomicU32::new(0),
        }
    }

    /// Install a new factor and restart the tick sequence, so forwarding is
    /// deterministic from the moment of configuration.
    pub fn configure(&self, factor: u32) {
        self.factor.store(factor.max(1), Ordering::Release);
        self.tick.store(0, Ordering::Release);
    }

    pub fn factor(&self) -> u32 {
        self.factor.load(Ordering::Acquire)
    }

    /// True when the current raw sample should be forwarded.
    pub fn admit(&self) -> bool {
        let factor = self.factor.load(Ordering::Acquire);
        if factor <= 1 {
            return true;
        }
        let prev = self
            .tick
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some((t + 1) % factor)
            })
            .unwrap_or_else(|t| t);
        (prev + 1) % factor == 0
    }
}

impl Default for DownsampleGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_one_admits_everything() {
        let gate = DownsampleGate::new();
        assert!((0..10).all(|_| gate.admit()));
    }

    #[test]
    fn factor_three_admits_every_third() {
        let gate = DownsampleGate::new();
        gate.configure(3);
        let pattern: Vec<bool> = (0..9).map(|_| gate.admit()).collect();
        assert_eq!(
            pattern,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn exactly_one_of_any_factor_consecutive_samples_passes() {
        let gate = DownsampleGate::new();
        gate.configure(4);
        for _ in 0..5 {
            let admitted = (0..4).filter(|_| gate.admit()).count();
            assert_eq!(admitted, 1);
        }
    }

    #[test]
    fn configure_restarts_the_phase() {
        let gate = DownsampleGate::new();
        gate.configure(2);
        assert!(!gate.admit());
        assert!(gate.admit());

        gate.configure(2);
        // same deterministic pattern from the start again
        assert!(!gate.admit());
        assert!(gate.admit());
    }

    #[test]
    fn zero_factor_is_clamped() {
        let gate = DownsampleGate::new();
        gate.configure(0);
        assert_eq!(gate.factor(), 1);
        assert!(gate.admit());
    }
}

/// Outcome of stream-frequency negotiation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Negotiated {
    /// Frequency to program into the device
    pub base: f32,
    /// Integer downsample factor, >= 1
    pub factor: u32,
}

impl Negotiated {
    /// The client-visible stream rate; may differ from the literal request.
    pub fn achieved(&self) -> f32 {
        self.base / self.factor as f32
    }
}

/// Nearest-integer rounding, tolerating the slightly-off frequencies real
/// devices report (e.g. 119.7 for the 120 Hz mode).
fn round_to_int(f: f32) -> i64 {
    (f + 0.5).floor() as i64
}

/// Map a requested stream frequency onto the supported set.
///
/// A supported frequency is a candidate iff its rounded value is evenly
/// divisible by the rounded request; among candidates the one needing the
/// least downsampling wins, ties broken by scan order. A request that rounds
/// to zero has no candidates.
pub fn negotiate(requested: f32, supported: &[f32]) -> Option<Negotiated> {
    let target = round_to_int(requested);
    if target <= 0 {
        return None;
    }

    let mut best: Option<Negotiated> = None;
    for &freq in supported {
        let rounded = round_to_int(freq);
        if rounded <= 0 || rounded % target != 0 {
            continue;
        }
        let factor = round_to_int(freq / requested) as u32;
        match best {
            Some(b) if b.factor <= factor => {}
            _ => {
                best = Some(Negotiated {
                    base: freq,
                    factor,
                })
            }
        }
    }
    best
}

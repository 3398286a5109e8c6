use super::*;

/// Target spacing between accepted shares.
pub const TARGET_SHARE_INTERVAL: Duration = Duration::from_secs(20);

/// Number of recent share timestamps the controller averages over.
pub const SAMPLE_CAPACITY: usize = 16;

/// Ceiling for any assigned difficulty.
pub const MAXIMUM_DIFFICULTY: f64 = 4_294_967_296.0;

/// Per-session difficulty controller. Keeps a ring of the last
/// [`SAMPLE_CAPACITY`] accepted-share timestamps and, once the ring is full,
/// scales the current difficulty by the ratio of observed to target share
/// rate, snapped to the power-of-two lattice. The retarget is a pure function
/// of the ring, so repeated calls without new samples agree.
#[derive(Debug, Clone)]
pub struct Vardiff {
    samples: VecDeque<Instant>,
    current: f64,
    floor: f64,
}

impl Vardiff {
    pub fn new(current: f64, floor: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
            current,
            floor,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn set_current(&mut self, difficulty: f64) {
        self.current = difficulty;
    }

    /// Raise the floor, typically to the miner's suggested difficulty.
    pub fn set_floor(&mut self, floor: f64) {
        self.floor = floor;
    }

    pub fn record_share(&mut self, timestamp: Instant) {
        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(timestamp);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// A new difficulty, or `None` while the ring is short, the observed rate
    /// is degenerate, or the snapped result equals the current difficulty.
    pub fn retarget(&self) -> Option<f64> {
        if self.samples.len() < SAMPLE_CAPACITY {
            return None;
        }

        let oldest = *self.samples.front().expect("ring is full");
        let newest = *self.samples.back().expect("ring is full");

        let window = newest.duration_since(oldest).as_secs_f64();
        if window <= 0.0 {
            return None;
        }

        // N timestamps bound N - 1 completed share intervals.
        let rate = (self.samples.len() - 1) as f64 / window;
        let suggested = self.current * rate * TARGET_SHARE_INTERVAL.as_secs_f64();

        if !suggested.is_finite() || suggested <= 0.0 {
            return None;
        }

        let snapped = 2f64.powi(suggested.log2().round() as i32);
        let clamped = snapped.clamp(self.floor, MAXIMUM_DIFFICULTY);

        (clamped != self.current).then_some(clamped)
    }
}

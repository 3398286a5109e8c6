use super::*;

/// Expected hashes per difficulty-1 share.
pub const HASHES_PER_DIFFICULTY_1: f64 = 4_294_967_296.0;

const SI_PREFIXES: &[(&str, f64)] = &[
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("K", 1e3),
];

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct HashRate(pub f64);

impl HashRate {
    pub const ZERO: Self = Self(0.0);

    /// Estimate from accumulated share difficulty over an observation window.
    pub fn estimate(total_difficulty: f64, window: Duration) -> Self {
        if window.is_zero() {
            return Self::ZERO;
        }

        Self(total_difficulty * HASHES_PER_DIFFICULTY_1 / window.as_secs_f64())
    }

    pub fn from_difficulty_rate(difficulty: f64, shares_per_sec: f64) -> Self {
        Self(difficulty * shares_per_sec * HASHES_PER_DIFFICULTY_1)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl Display for HashRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (prefix, scale) in SI_PREFIXES {
            if self.0 >= *scale {
                return write!(f, "{:.2} {prefix}H/s", self.0 / scale);
            }
        }
        write!(f, "{:.2} H/s", self.0)
    }
}

use super::*;

/// Scale factor for storing fractional difficulty in an atomic counter.
const DIFFICULTY_SCALE: f64 = 1_000_000.0;

/// Pool-wide counters, shared by every session task.
pub struct PoolStats {
    sessions: AtomicU64,
    shares: AtomicU64,
    blocks: AtomicU64,
    difficulty_scaled: AtomicU64,
    started: Instant,
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolStats {
    pub fn new() -> Self {
        Self {
            sessions: AtomicU64::new(0),
            shares: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            difficulty_scaled: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn add_session(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sub_session(&self) {
        self.sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_share(&self, difficulty: f64) {
        self.shares.fetch_add(1, Ordering::Relaxed);
        self.difficulty_scaled
            .fetch_add((difficulty * DIFFICULTY_SCALE) as u64, Ordering::Relaxed);
    }

    pub fn add_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    pub fn shares(&self) -> u64 {
        self.shares.load(Ordering::Relaxed)
    }

    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn hash_rate(&self) -> HashRate {
        let total = self.difficulty_scaled.load(Ordering::Relaxed) as f64 / DIFFICULTY_SCALE;
        HashRate::estimate(total, self.uptime())
    }

    pub fn status_line(&self) -> String {
        format!(
            "hashrate={}  sessions={}  shares={}  blocks={}  uptime={}s",
            self.hash_rate(),
            self.sessions(),
            self.shares(),
            self.blocks(),
            self.uptime().as_secs(),
        )
    }
}

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Accepted,
    Duplicate,
}

/// Per-session share bookkeeping: exact-tuple dedup of accepted submissions,
/// running totals, and the best share difficulty seen.
#[derive(Debug, Default)]
pub struct ShareAccounting {
    seen: HashSet<(JobId, Extranonce, Ntime, Nonce)>,
    accepted: u64,
    total_difficulty: f64,
    best_difficulty: f64,
    started: Option<Instant>,
}

impl ShareAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submission that already passed the session difficulty check.
    /// Only accepted tuples enter the dedup set, so resubmitting a share that
    /// was rejected for other reasons is not reported as a duplicate.
    pub fn submit(
        &mut self,
        submit: &Submit,
        session_difficulty: f64,
        share_difficulty: f64,
    ) -> ShareOutcome {
        let key = (
            submit.job_id,
            submit.extranonce2.clone(),
            submit.ntime,
            submit.nonce,
        );

        if !self.seen.insert(key) {
            return ShareOutcome::Duplicate;
        }

        self.started.get_or_insert_with(Instant::now);
        self.accepted += 1;
        self.total_difficulty += session_difficulty;

        if share_difficulty > self.best_difficulty {
            self.best_difficulty = share_difficulty;
        }

        ShareOutcome::Accepted
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn best_difficulty(&self) -> f64 {
        self.best_difficulty
    }

    pub fn hash_rate(&self) -> HashRate {
        match self.started {
            Some(started) => HashRate::estimate(self.total_difficulty, started.elapsed()),
            None => HashRate::ZERO,
        }
    }
}

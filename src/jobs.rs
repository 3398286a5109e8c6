use {super::*, lru::LruCache};

const JOB_TABLE_SIZE: usize = 64;

/// The jobs a single session may still submit against. Bounded: between
/// clean pushes at most [`JOB_TABLE_SIZE`] template refreshes stay
/// referenceable, and a clean push drops everything older.
#[derive(Debug)]
pub struct Jobs {
    latest: Option<Arc<Job>>,
    valid: LruCache<JobId, Arc<Job>>,
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}

impl Jobs {
    pub fn new() -> Self {
        Self {
            latest: None,
            valid: LruCache::new(NonZeroUsize::new(JOB_TABLE_SIZE).expect("non-zero capacity")),
        }
    }

    pub fn insert(&mut self, job: Arc<Job>, clean: bool) {
        if clean {
            self.valid.clear();
        }
        self.latest = Some(job.clone());
        self.valid.put(job.job_id, job);
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.valid.peek(id).cloned()
    }

    pub fn latest(&self) -> Option<Arc<Job>> {
        self.latest.clone()
    }
}

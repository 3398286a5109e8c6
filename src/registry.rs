use super::*;

/// Process-wide job fabric: allocates job ids, turns templates into
/// workbases, and fans them out to sessions over a latest-wins watch channel.
/// A slow session only ever observes the most recent workbase.
#[derive(Debug)]
pub struct JobRegistry {
    next_id: AtomicU64,
    sender: watch::Sender<Arc<Workbase>>,
}

impl JobRegistry {
    pub fn new(initial: BlockTemplate) -> Self {
        let next_id = AtomicU64::new(0);
        let job_id = JobId::new(next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, _) = watch::channel(Arc::new(Workbase::new(initial, job_id, true)));

        Self { next_id, sender }
    }

    /// A fresh id, unique for the lifetime of the process.
    pub fn next_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish a template to every subscribed session. Jobs are cleaned when
    /// the template builds on a new tip.
    pub fn publish(&self, template: BlockTemplate) {
        let clean_jobs = template.is_new_tip(Some(&self.current().template));
        let workbase = Workbase::new(template, self.next_id(), clean_jobs);

        debug!(
            "Publishing job {} for height {} (clean={clean_jobs})",
            workbase.job_id, workbase.template.height
        );

        self.sender.send_replace(Arc::new(workbase));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Workbase>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Arc<Workbase> {
        self.sender.borrow().clone()
    }
}

use super::*;

/// Polls the node for fresh templates and feeds them into the registry. The
/// registry decides whether a template obsoletes outstanding jobs; sessions
/// only ever hear about templates through its broadcast.
pub(crate) struct Generator {
    rpc: Arc<dyn BitcoinRpc>,
    registry: Arc<JobRegistry>,
    update_interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Generator {
    pub(crate) fn new(
        rpc: Arc<dyn BitcoinRpc>,
        registry: Arc<JobRegistry>,
        update_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rpc,
            registry,
            update_interval,
            cancel,
            handle: None,
        }
    }

    pub(crate) fn spawn(&mut self) {
        let rpc = self.rpc.clone();
        let registry = self.registry.clone();
        let cancel = self.cancel.clone();
        let mut ticker = interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let handle = tokio::spawn(async move {
            info!("Spawning template generator");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match rpc.get_block_template().await {
                            Ok(template) => {
                                info!(
                                    "New block template for height {} ({} transactions, reward {})",
                                    template.height,
                                    template.transactions.len(),
                                    template.reward(),
                                );
                                registry.publish(template);
                            }
                            Err(err) => warn!("Failed to fetch block template: {err}"),
                        }
                    }
                }
            }

            info!("Shutting down template generator");
        });

        self.handle = Some(handle);
    }

    pub(crate) async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

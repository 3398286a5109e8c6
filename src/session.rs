use super::*;

/// How often per-session maintenance (vardiff retarget, idle check) runs.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Sessions with no accepted share for this long are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Shared wiring handed to every session by the orchestrator.
pub struct PoolContext {
    pub chain: Chain,
    pub version_mask: Version,
    pub dev_fee_address: Option<Address>,
    pub registry: Arc<JobRegistry>,
    pub rpc: Arc<dyn BitcoinRpc>,
    pub stores: Stores,
    pub stats: Arc<PoolStats>,
    pub found_blocks: broadcast::Sender<BlockFound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Greeting,
    Handshaking,
    Active,
    Closed,
}

/// One miner connection: drives the handshake, relays jobs from the
/// registry, and validates submissions. All session state is owned by this
/// task; the only shared pieces are the context handles.
pub struct Session<R, W> {
    context: Arc<PoolContext>,
    peer: SocketAddr,
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    workbases: watch::Receiver<Arc<Workbase>>,
    cancel: CancellationToken,
    state: SessionState,
    jobs: Jobs,
    enonce1: Extranonce,
    user_agent: Option<String>,
    address: Option<Address>,
    worker: Option<String>,
    version_mask: Option<Version>,
    difficulty: f64,
    used_suggested_difficulty: bool,
    registered: bool,
    accounting: ShareAccounting,
    vardiff: Vardiff,
    started_at: u64,
    last_share: Instant,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        context: Arc<PoolContext>,
        peer: SocketAddr,
        reader: R,
        writer: W,
        cancel: CancellationToken,
    ) -> Self {
        let workbases = context.registry.subscribe();
        context.stats.add_session();

        info!(
            "Session {peer} opened (vardiff: {} samples, {}s target, pow2 lattice)",
            vardiff::SAMPLE_CAPACITY,
            vardiff::TARGET_SHARE_INTERVAL.as_secs(),
        );

        Self {
            context,
            peer,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            workbases,
            cancel,
            state: SessionState::Greeting,
            jobs: Jobs::new(),
            enonce1: Extranonce::random(EXTRANONCE1_SIZE),
            user_agent: None,
            address: None,
            worker: None,
            version_mask: None,
            difficulty: DEFAULT_DIFFICULTY,
            used_suggested_difficulty: false,
            registered: false,
            accounting: ShareAccounting::new(),
            vardiff: Vardiff::new(DEFAULT_DIFFICULTY, MINIMUM_DIFFICULTY),
            started_at: unix_timestamp(),
            last_share: Instant::now(),
        }
    }

    pub async fn serve(&mut self) -> Result {
        let mut workbases = self.workbases.clone();
        let cancel = self.cancel.clone();

        let mut ticker = interval(MAINTENANCE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Disconnecting {}", self.peer);
                    break Ok(());
                }
                message = Self::read_message(&mut self.reader, self.peer) => {
                    match message {
                        Ok(Some(message)) => {
                            if let Err(err) = self.handle_message(message).await {
                                break Err(err);
                            }
                        }
                        Ok(None) => break Ok(()),
                        Err(err) => break Err(err),
                    }
                }
                changed = workbases.changed() => {
                    if changed.is_err() {
                        warn!("Job broadcast dropped, closing session {}", self.peer);
                        break Ok(());
                    }

                    let workbase = workbases.borrow_and_update().clone();

                    if self.state == SessionState::Active {
                        let job_id = workbase.job_id;
                        let clean = workbase.clean_jobs;
                        if let Err(err) = self.push_job(workbase, job_id, clean).await {
                            break Err(err);
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        break Err(err);
                    }
                }
            }
        };

        self.state = SessionState::Closed;
        self.teardown().await;

        result
    }

    async fn handle_message(&mut self, message: Message) -> Result {
        let Message::Request { id, method, params } = message else {
            debug!("Ignoring non-request message from {}", self.peer);
            return Ok(());
        };

        match method.as_str() {
            "mining.configure" => match serde_json::from_value::<Configure>(params) {
                Ok(configure) => self.configure(id, configure).await,
                Err(err) => self.validation_error(id, err).await,
            },
            "mining.subscribe" => match serde_json::from_value::<Subscribe>(params) {
                Ok(subscribe) => self.subscribe(id, subscribe).await,
                Err(err) => self.validation_error(id, err).await,
            },
            "mining.authorize" => match serde_json::from_value::<Authorize>(params) {
                Ok(authorize) => self.authorize(id, authorize).await,
                Err(err) => self.validation_error(id, err).await,
            },
            "mining.suggest_difficulty" => {
                match serde_json::from_value::<SuggestDifficulty>(params) {
                    Ok(suggest) => self.suggest_difficulty(id, suggest).await,
                    Err(err) => self.validation_error(id, err).await,
                }
            }
            "mining.submit" => match serde_json::from_value::<Submit>(params) {
                Ok(submit) => self.submit(id, submit).await,
                Err(err) => self.validation_error(id, err).await,
            },
            method => {
                debug!("Ignoring unknown method {method} from {}", self.peer);
                Ok(())
            }
        }
    }

    async fn configure(&mut self, id: Id, configure: Configure) -> Result {
        if !matches!(
            self.state,
            SessionState::Greeting | SessionState::Handshaking
        ) {
            return self
                .send_error(
                    id,
                    StratumError::Unknown,
                    Some(json!({"reason": "configure after handshake"})),
                )
                .await;
        }

        let result = if configure.requests_version_rolling() {
            // Grant the intersection of the miner's mask and ours.
            let requested = configure
                .version_rolling_mask
                .unwrap_or(self.context.version_mask);
            let granted = requested & self.context.version_mask;

            self.version_mask = Some(granted);

            debug!("Granting version rolling mask {granted} to {}", self.peer);

            json!({
                "version-rolling": true,
                "version-rolling.mask": granted,
            })
        } else {
            warn!(
                "No supported extension in configure from {}: {:?}",
                self.peer, configure.extensions
            );
            json!({})
        };

        self.send(Message::Response {
            id,
            result: Some(result),
            error: None,
        })
        .await?;

        if self.state == SessionState::Greeting {
            self.state = SessionState::Handshaking;
        }

        Ok(())
    }

    async fn subscribe(&mut self, id: Id, subscribe: Subscribe) -> Result {
        if !matches!(
            self.state,
            SessionState::Greeting | SessionState::Handshaking
        ) {
            return self
                .send_error(
                    id,
                    StratumError::Unknown,
                    Some(json!({"reason": "subscribe after handshake"})),
                )
                .await;
        }

        if let Some(requested) = &subscribe.extranonce1 {
            warn!("Ignoring extranonce1 suggestion {requested} from {}", self.peer);
        }

        let result = SubscribeResult {
            subscriptions: vec![
                (
                    "mining.set_difficulty".to_string(),
                    SUBSCRIPTION_ID.to_string(),
                ),
                ("mining.notify".to_string(), SUBSCRIPTION_ID.to_string()),
            ],
            extranonce1: self.enonce1.clone(),
            extranonce2_size: EXTRANONCE2_SIZE as u32,
        };

        self.send(Message::Response {
            id,
            result: Some(json!(result)),
            error: None,
        })
        .await?;

        self.user_agent = Some(subscribe.user_agent);
        self.state = SessionState::Handshaking;

        self.try_activate().await
    }

    async fn authorize(&mut self, id: Id, authorize: Authorize) -> Result {
        if !matches!(
            self.state,
            SessionState::Greeting | SessionState::Handshaking
        ) {
            return self
                .send_error(
                    id,
                    StratumError::Unknown,
                    Some(json!({"reason": "authorize after handshake"})),
                )
                .await;
        }

        let address = match authorize.username.address(self.context.chain.network()) {
            Ok(address) => address,
            Err(err) => {
                warn!("Rejecting worker {}: {err}", authorize.username);
                return self
                    .send_error(
                        id,
                        StratumError::Unauthorized,
                        Some(json!({
                            "username": authorize.username.as_str(),
                            "reason": err.to_string(),
                        })),
                    )
                    .await;
            }
        };

        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
        })
        .await?;

        self.address = Some(address);
        self.worker = Some(authorize.username.worker().to_string());

        if self.state == SessionState::Greeting {
            self.state = SessionState::Handshaking;
        }

        self.try_activate().await
    }

    /// One-shot: the first suggestion pins the session difficulty and raises
    /// the vardiff floor; anything later is acknowledged and ignored.
    async fn suggest_difficulty(&mut self, id: Id, suggest: SuggestDifficulty) -> Result {
        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
        })
        .await?;

        if self.used_suggested_difficulty {
            debug!("Ignoring repeated difficulty suggestion from {}", self.peer);
            return Ok(());
        }

        let difficulty = suggest.difficulty().as_f64();

        self.used_suggested_difficulty = true;
        self.difficulty = difficulty;
        self.vardiff.set_current(difficulty);
        self.vardiff.set_floor(difficulty);

        self.send_set_difficulty().await
    }

    /// Handshake completion: once both the subscription and the
    /// authorization are in, register the client, announce the difficulty,
    /// push the current job, and go active.
    async fn try_activate(&mut self) -> Result {
        if self.state == SessionState::Active
            || self.user_agent.is_none()
            || self.address.is_none()
        {
            return Ok(());
        }

        let user_agent = self.user_agent.clone().expect("checked above");
        let address = self.address.clone().expect("checked above");
        let worker = self.worker.clone().unwrap_or_else(|| "default".into());

        if user_agent.starts_with("cpuminer") {
            self.difficulty = CPUMINER_DIFFICULTY;
            self.vardiff.set_current(CPUMINER_DIFFICULTY);
        }

        if !self.used_suggested_difficulty {
            self.send_set_difficulty().await?;
        }

        if let Err(err) = self
            .context
            .stores
            .clients
            .insert(ClientRecord {
                address: address.clone(),
                worker: worker.clone(),
                enonce1: self.enonce1.clone(),
                user_agent: Some(user_agent.clone()),
                started_at: self.started_at,
                best_difficulty: 0.0,
            })
            .await
        {
            warn!("Failed to register client {address}.{worker}: {err}");
        } else {
            self.registered = true;
        }

        self.state = SessionState::Active;

        info!(
            "Session {} active: {address}.{worker} ({user_agent}) difficulty {}",
            self.peer, self.difficulty
        );

        let workbase = self.context.registry.current();
        let job_id = workbase.job_id;
        self.push_job(workbase, job_id, true).await
    }

    async fn submit(&mut self, id: Id, submit: Submit) -> Result {
        if self.state != SessionState::Active {
            let error = if self.user_agent.is_none() {
                StratumError::NotSubscribed
            } else {
                StratumError::Unauthorized
            };
            return self.send_error(id, error, None).await;
        }

        let Some(job) = self.jobs.get(&submit.job_id) else {
            debug!("Stale submission for job {} from {}", submit.job_id, self.peer);
            return self
                .send_error(
                    id,
                    StratumError::JobNotFound,
                    Some(json!({"job_id": submit.job_id.to_string()})),
                )
                .await;
        };

        if submit.extranonce2.len() != EXTRANONCE2_SIZE {
            return self
                .send_error(
                    id,
                    StratumError::Unknown,
                    Some(json!({
                        "reason": "bad extranonce2 length",
                        "expected": EXTRANONCE2_SIZE,
                        "received": submit.extranonce2.len(),
                    })),
                )
                .await;
        }

        if let Some(bits) = submit.version_bits {
            let Some(mask) = self.version_mask else {
                return self
                    .send_error(
                        id,
                        StratumError::Unknown,
                        Some(json!({"reason": "version rolling was not negotiated"})),
                    )
                    .await;
            };

            if !(bits & !mask).is_zero() {
                return self
                    .send_error(
                        id,
                        StratumError::Unknown,
                        Some(json!({
                            "reason": "version bits outside negotiated mask",
                            "mask": mask.to_string(),
                        })),
                    )
                    .await;
            }
        }

        let header = match job.header(&submit) {
            Ok(header) => header,
            Err(err) => {
                return self
                    .send_error(
                        id,
                        StratumError::Unknown,
                        Some(json!({"reason": err.to_string()})),
                    )
                    .await;
            }
        };

        let hash = header.block_hash();
        let share_difficulty = Difficulty::from_hash(hash).as_f64();

        if share_difficulty < self.difficulty {
            debug!(
                "Low difficulty share from {}: {share_difficulty:.3} < {}",
                self.peer, self.difficulty
            );
            return self
                .send_error(
                    id,
                    StratumError::LowDifficultyShare,
                    Some(json!({
                        "share": share_difficulty,
                        "required": self.difficulty,
                    })),
                )
                .await;
        }

        let previous_best = self.accounting.best_difficulty();

        if self.accounting.submit(&submit, self.difficulty, share_difficulty)
            == ShareOutcome::Duplicate
        {
            return self
                .send_error(id, StratumError::DuplicateShare, None)
                .await;
        }

        if header.validate_pow(job.nbits().target()).is_ok() {
            self.submit_block(&job, &submit, header, hash, share_difficulty)
                .await;
        }

        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
        })
        .await?;

        self.last_share = Instant::now();
        self.vardiff.record_share(self.last_share);
        self.context.stats.add_share(self.difficulty);

        self.record_submission(&submit, hash).await;

        if share_difficulty > previous_best {
            self.update_best_difficulty(share_difficulty).await;
        }

        Ok(())
    }

    /// A share met the network target: ship the full block to the node and
    /// fan the outcome out. Failures here never cancel the share credit, the
    /// share already met the session difficulty.
    async fn submit_block(
        &mut self,
        job: &Job,
        submit: &Submit,
        header: Header,
        hash: BlockHash,
        share_difficulty: f64,
    ) {
        let height = job.workbase.template.height;

        info!("Share {hash} meets network difficulty at height {height}");

        let block = match job.assemble_block(submit, header) {
            Ok(block) => block,
            Err(err) => {
                error!("Failed to assemble block for {hash}: {err}");
                return;
            }
        };

        let block_hex = hex::encode(consensus::serialize(&block));

        let rejection = match self.context.rpc.submit_block(block_hex).await {
            Ok(rejection) => rejection,
            Err(err) => {
                error!("Block submission RPC failed for {hash}: {err}");
                return;
            }
        };

        let (Some(address), Some(worker)) = (self.address.clone(), self.worker.clone()) else {
            return;
        };

        let _ = self.context.found_blocks.send(BlockFound {
            height,
            hash,
            address: address.clone(),
            worker: worker.clone(),
            difficulty: share_difficulty,
            rejection: rejection.clone(),
        });

        match rejection {
            None => {
                info!("Mined block {hash} at height {height}");
                self.context.stats.add_block();

                if let Err(err) = self
                    .context
                    .stores
                    .blocks
                    .save(BlockRecord {
                        height,
                        hash,
                        address,
                        worker,
                        timestamp: unix_timestamp(),
                    })
                    .await
                {
                    error!("Failed to persist block {hash}: {err}");
                }

                if let Err(err) = self
                    .context
                    .stores
                    .address_settings
                    .reset_best_difficulty_and_shares()
                    .await
                {
                    error!("Failed to reset best share counters: {err}");
                }
            }
            Some(reason) => error!("Block {hash} rejected by node: {reason}"),
        }
    }

    async fn record_submission(&mut self, submit: &Submit, hash: BlockHash) {
        let (Some(address), Some(worker)) = (self.address.clone(), self.worker.clone()) else {
            return;
        };

        if let Err(err) = self
            .context
            .stores
            .statistics
            .add_submission(SubmissionRecord {
                address,
                worker,
                enonce1: self.enonce1.clone(),
                hash,
                difficulty: self.difficulty,
                timestamp: unix_timestamp(),
            })
            .await
        {
            warn!("Failed to record submission from {}: {err}", self.peer);
        }
    }

    async fn update_best_difficulty(&mut self, share_difficulty: f64) {
        let Some(address) = self.address.clone() else {
            return;
        };

        if let Err(err) = self
            .context
            .stores
            .clients
            .update_best_difficulty(&self.enonce1, share_difficulty)
            .await
        {
            warn!("Failed to update client best difficulty: {err}");
        }

        if let Err(err) = self
            .context
            .stores
            .address_settings
            .update_best_difficulty(&address, share_difficulty)
            .await
        {
            warn!("Failed to update address best difficulty: {err}");
        }
    }

    async fn push_job(
        &mut self,
        workbase: Arc<Workbase>,
        job_id: JobId,
        clean: bool,
    ) -> Result {
        let Some(address) = self.address.clone() else {
            return Ok(());
        };
        let worker = self.worker.clone().unwrap_or_else(|| "default".into());

        let payouts = self.payouts(&address, &worker).await;

        let job = match Job::new(
            workbase,
            job_id,
            payouts,
            self.enonce1.clone(),
            self.version_mask,
        ) {
            Ok(job) => Arc::new(job),
            Err(err) => {
                // Keep the session alive; the miner sees a gap until the
                // next usable template.
                error!("Failed to build job for {}: {err}", self.peer);
                return Ok(());
            }
        };

        self.jobs.insert(job.clone(), clean);

        debug!("Pushing job {} to {} (clean={clean})", job.job_id, self.peer);

        self.send(Message::Notification {
            method: "mining.notify".into(),
            params: json!(job.notify(clean)),
        })
        .await
    }

    /// Payout split for the next job: everything to the miner, unless the
    /// dev fee is configured and the worker hashes above the threshold.
    async fn payouts(&self, address: &Address, worker: &str) -> Vec<Payout> {
        if let Some(dev) = self.context.dev_fee_address.clone() {
            match self
                .context
                .stores
                .statistics
                .hash_rate(address, worker)
                .await
            {
                Ok(rate) if rate.as_f64() >= DEV_FEE_THRESHOLD => {
                    return Payout::with_dev_fee(address.clone(), dev, DEV_FEE_BASIS_POINTS);
                }
                Ok(_) => {}
                Err(err) => warn!("Hash rate lookup failed for {address}.{worker}: {err}"),
            }
        }

        Payout::whole(address.clone())
    }

    async fn tick(&mut self) -> Result {
        if self.last_share.elapsed() >= IDLE_TIMEOUT {
            bail!(
                "closing idle session {}: no accepted share in {}s",
                self.peer,
                IDLE_TIMEOUT.as_secs()
            );
        }

        if self.state != SessionState::Active {
            return Ok(());
        }

        let Some(new_difficulty) = self.vardiff.retarget() else {
            return Ok(());
        };

        info!(
            "Retargeting {} from {} to {new_difficulty}",
            self.peer, self.difficulty
        );

        self.difficulty = new_difficulty;
        self.vardiff.set_current(new_difficulty);

        self.send_set_difficulty().await?;

        // Force a clean job so the miner starts on the new difficulty
        // immediately instead of finishing stale work.
        let workbase = self.context.registry.current();
        let job_id = self.context.registry.next_id();
        self.push_job(workbase, job_id, true).await
    }

    async fn send_set_difficulty(&mut self) -> Result {
        self.send(Message::Notification {
            method: "mining.set_difficulty".into(),
            params: json!(SetDifficulty(Difficulty::new(self.difficulty))),
        })
        .await
    }

    async fn read_message(
        reader: &mut FramedRead<R, LinesCodec>,
        peer: SocketAddr,
    ) -> Result<Option<Message>> {
        match reader.next().await {
            Some(Ok(line)) => {
                let message = serde_json::from_str::<Message>(&line).map_err(|e| {
                    anyhow!("invalid stratum message from {peer}: {e}; line={line:?}")
                })?;
                Ok(Some(message))
            }
            Some(Err(e)) => Err(anyhow!("read error from {peer}: {e}")),
            None => {
                info!("Session {peer} disconnected");
                Ok(None)
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }

    async fn send_error(
        &mut self,
        id: Id,
        error: StratumError,
        traceback: Option<Value>,
    ) -> Result {
        self.send(Message::Response {
            id,
            result: None,
            error: Some(error.into_response(traceback)),
        })
        .await
    }

    async fn validation_error(&mut self, id: Id, err: serde_json::Error) -> Result {
        self.send_error(
            id,
            StratumError::Unknown,
            Some(json!({"reason": err.to_string()})),
        )
        .await
    }

    async fn teardown(&mut self) {
        if self.registered {
            if let Err(err) = self.context.stores.clients.remove(&self.enonce1).await {
                warn!("Failed to deregister client {}: {err}", self.peer);
            }
        }
    }
}

impl<R, W> Drop for Session<R, W> {
    fn drop(&mut self) {
        self.context.stats.sub_session();
        info!(
            "Session {} closed (remaining: {})",
            self.peer,
            self.context.stats.sessions(),
        );
    }
}

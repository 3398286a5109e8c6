use {
    super::*,
    pool_config::PoolConfig,
    rpc::CoreRpc,
    session::{PoolContext, Session},
};

pub(crate) mod pool_config;

#[derive(Parser, Debug)]
pub(crate) struct Pool {
    #[command(flatten)]
    pub(crate) config: PoolConfig,
}

impl Pool {
    pub(crate) async fn run(&self, options: Options, cancel_token: CancellationToken) -> Result {
        let config = self.config.clone();
        let chain = options.chain();
        let dev_fee_address = options.dev_fee_address()?;

        if let Some(address) = &dev_fee_address {
            info!("Dev fee enabled, paying {address}");
        }

        let rpc: Arc<dyn BitcoinRpc> = Arc::new(CoreRpc::new(&options)?);

        let initial = rpc
            .get_block_template()
            .await
            .context("initial getblocktemplate failed, is the node reachable?")?;

        info!("Initial template at height {}", initial.height);

        let registry = Arc::new(JobRegistry::new(initial));
        let stats = Arc::new(PoolStats::new());
        let (found_blocks, found_blocks_rx) = events::channel();

        let context = Arc::new(PoolContext {
            chain,
            version_mask: config.version_mask(),
            dev_fee_address,
            registry: registry.clone(),
            rpc: rpc.clone(),
            stores: Stores::in_memory(),
            stats: stats.clone(),
            found_blocks,
        });

        let mut generator = Generator::new(
            rpc,
            registry,
            config.update_interval(),
            cancel_token.child_token(),
        );
        generator.spawn();

        tokio::spawn(announce_blocks(found_blocks_rx));

        let address = config.address();
        let port = config.port();

        let listener = TcpListener::bind((address.clone(), port)).await?;

        eprintln!("Listening on {address}:{port}");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!("Accept failed: {err}");
                            continue;
                        }
                    };

                    if stats.sessions() >= config.max_sessions() {
                        warn!(
                            "Session limit {} reached, dropping {peer}",
                            config.max_sessions()
                        );
                        continue;
                    }

                    stream.set_nodelay(true)?;

                    info!("Accepted connection from {peer}");

                    let (reader, writer) = stream.into_split();
                    let context = context.clone();
                    let session_cancel = cancel_token.child_token();

                    tokio::task::spawn(async move {
                        let mut session =
                            Session::new(context, peer, reader, writer, session_cancel);

                        if let Err(err) = session.serve().await {
                            error!("Session error: {err}");
                        }
                    });
                }
                _ = cancel_token.cancelled() => {
                    info!("Shutting down pool: {}", stats.status_line());
                    generator.shutdown().await;
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn announce_blocks(mut receiver: broadcast::Receiver<BlockFound>) {
    while let Ok(event) = receiver.recv().await {
        if event.accepted() {
            info!(
                "BLOCK FOUND at height {} by {}.{}: {}",
                event.height, event.address, event.worker, event.hash,
            );
        } else {
            warn!(
                "Block candidate {} at height {} rejected: {}",
                event.hash,
                event.height,
                event.rejection.as_deref().unwrap_or("unknown"),
            );
        }
    }
}

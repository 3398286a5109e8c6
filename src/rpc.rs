use {super::*, async_trait::async_trait, bitcoincore_rpc::RpcApi};

/// The node interface the pool depends on. `submit_block` resolves to `None`
/// on acceptance and to the node's rejection reason otherwise.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    async fn get_block_template(&self) -> Result<BlockTemplate>;
    async fn submit_block(&self, block_hex: String) -> Result<Option<String>>;
}

/// Bitcoin Core adapter; the underlying client is blocking, so calls hop
/// onto the blocking pool.
pub struct CoreRpc {
    client: Arc<bitcoincore_rpc::Client>,
}

impl CoreRpc {
    pub fn new(options: &Options) -> Result<Self> {
        let client = bitcoincore_rpc::Client::new(
            &options.bitcoin_rpc_url(),
            options.bitcoin_credentials()?,
        )
        .context("failed to create Bitcoin Core RPC client")?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl BitcoinRpc for CoreRpc {
    async fn get_block_template(&self) -> Result<BlockTemplate> {
        let client = self.client.clone();

        task::spawn_blocking(move || {
            let params = json!({
                "capabilities": ["coinbasetxn", "workid", "coinbase/append"],
                "rules": ["segwit"],
            });

            let template = client.call::<BlockTemplate>("getblocktemplate", &[params])?;

            Ok(template)
        })
        .await?
    }

    async fn submit_block(&self, block_hex: String) -> Result<Option<String>> {
        let client = self.client.clone();

        task::spawn_blocking(move || {
            let rejection =
                client.call::<Option<String>>("submitblock", &[Value::String(block_hex)])?;

            Ok(rejection)
        })
        .await?
    }
}

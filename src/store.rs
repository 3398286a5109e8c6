use {super::*, async_trait::async_trait};

/// Window over which stored submissions feed hash rate estimates.
const HASH_RATE_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub address: Address,
    pub worker: String,
    pub enonce1: Extranonce,
    pub user_agent: Option<String>,
    pub started_at: u64,
    pub best_difficulty: f64,
}

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub address: Address,
    pub worker: String,
    pub enonce1: Extranonce,
    pub hash: BlockHash,
    pub difficulty: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub height: u64,
    pub hash: BlockHash,
    pub address: Address,
    pub worker: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddressSettings {
    pub best_difficulty: f64,
    pub shares: u64,
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert(&self, client: ClientRecord) -> Result;
    async fn update_best_difficulty(&self, enonce1: &Extranonce, difficulty: f64) -> Result;
    async fn remove(&self, enonce1: &Extranonce) -> Result;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn add_submission(&self, submission: SubmissionRecord) -> Result;
    async fn hash_rate(&self, address: &Address, worker: &str) -> Result<HashRate>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn save(&self, block: BlockRecord) -> Result;
}

#[async_trait]
pub trait AddressSettingsStore: Send + Sync {
    async fn settings(&self, address: &Address) -> Result<AddressSettings>;
    async fn update_best_difficulty(&self, address: &Address, difficulty: f64) -> Result;
    async fn reset_best_difficulty_and_shares(&self) -> Result;
}

/// The persistence handles a session works against. Implementations are
/// injected by the orchestrator; sessions never construct their own.
#[derive(Clone)]
pub struct Stores {
    pub clients: Arc<dyn ClientStore>,
    pub statistics: Arc<dyn StatisticsStore>,
    pub blocks: Arc<dyn BlockStore>,
    pub address_settings: Arc<dyn AddressSettingsStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            clients: store.clone(),
            statistics: store.clone(),
            blocks: store.clone(),
            address_settings: store,
        }
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    clients: HashMap<String, ClientRecord>,
    submissions: Vec<SubmissionRecord>,
    blocks: Vec<BlockRecord>,
    settings: HashMap<String, AddressSettings>,
}

/// In-memory store backing all four interfaces; the default wiring and the
/// test double.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().expect("memory store lock")
    }

    pub fn clients(&self) -> Vec<ClientRecord> {
        self.lock().clients.values().cloned().collect()
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.lock().submissions.clone()
    }

    pub fn saved_blocks(&self) -> Vec<BlockRecord> {
        self.lock().blocks.clone()
    }

    pub fn settings_for(&self, address: &Address) -> Option<AddressSettings> {
        self.lock().settings.get(&address.to_string()).copied()
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn insert(&self, client: ClientRecord) -> Result {
        self.lock().clients.insert(client.enonce1.to_hex(), client);
        Ok(())
    }

    async fn update_best_difficulty(&self, enonce1: &Extranonce, difficulty: f64) -> Result {
        if let Some(client) = self.lock().clients.get_mut(&enonce1.to_hex()) {
            client.best_difficulty = difficulty;
        }
        Ok(())
    }

    async fn remove(&self, enonce1: &Extranonce) -> Result {
        self.lock().clients.remove(&enonce1.to_hex());
        Ok(())
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn add_submission(&self, submission: SubmissionRecord) -> Result {
        let mut inner = self.lock();

        let address = submission.address.to_string();
        let settings = inner.settings.entry(address).or_default();
        settings.shares += 1;

        inner.submissions.push(submission);
        Ok(())
    }

    async fn hash_rate(&self, address: &Address, worker: &str) -> Result<HashRate> {
        let cutoff = unix_timestamp().saturating_sub(HASH_RATE_WINDOW.as_secs());

        let total = self
            .lock()
            .submissions
            .iter()
            .filter(|submission| {
                submission.timestamp >= cutoff
                    && submission.address == *address
                    && submission.worker == worker
            })
            .map(|submission| submission.difficulty)
            .sum::<f64>();

        Ok(HashRate::estimate(total, HASH_RATE_WINDOW))
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn save(&self, block: BlockRecord) -> Result {
        self.lock().blocks.push(block);
        Ok(())
    }
}

#[async_trait]
impl AddressSettingsStore for MemoryStore {
    async fn settings(&self, address: &Address) -> Result<AddressSettings> {
        Ok(self
            .lock()
            .settings
            .get(&address.to_string())
            .copied()
            .unwrap_or_default())
    }

    async fn update_best_difficulty(&self, address: &Address, difficulty: f64) -> Result {
        self.lock()
            .settings
            .entry(address.to_string())
            .or_default()
            .best_difficulty = difficulty;
        Ok(())
    }

    async fn reset_best_difficulty_and_shares(&self) -> Result {
        for settings in self.lock().settings.values_mut() {
            *settings = AddressSettings::default();
        }
        Ok(())
    }
}

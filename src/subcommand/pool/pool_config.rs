use super::*;

#[derive(Clone, Default, Debug, Parser)]
pub(crate) struct PoolConfig {
    #[arg(long, help = "Listen at <ADDRESS>.")]
    pub address: Option<String>,
    #[arg(long, help = "Listen on <PORT>.")]
    pub port: Option<u16>,
    #[arg(long, help = "Poll for block templates every <UPDATE_INTERVAL> seconds.")]
    pub update_interval: Option<u64>,
    #[arg(long, help = "Allow version rolling within <VERSION_MASK>.")]
    pub version_mask: Option<String>,
    #[arg(long, help = "Serve at most <MAX_SESSIONS> concurrent sessions.")]
    pub max_sessions: Option<u64>,
}

impl PoolConfig {
    pub fn address(&self) -> String {
        self.address.clone().unwrap_or_else(|| "0.0.0.0".into())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(3333)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.unwrap_or(10))
    }

    pub fn version_mask(&self) -> Version {
        self.version_mask
            .as_deref()
            .and_then(|mask| Version::from_str(mask).ok())
            .unwrap_or_else(|| Version::from_str("1fffe000").expect("valid mask"))
    }

    pub fn max_sessions(&self) -> u64 {
        self.max_sessions.unwrap_or(1024)
    }
}

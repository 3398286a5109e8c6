use {
    accounting::{ShareAccounting, ShareOutcome},
    anyhow::{Context, Error, anyhow, bail, ensure},
    arguments::Arguments,
    bitcoin::{
        Address, Amount, Block, BlockHash, CompactTarget, Network, OutPoint, ScriptBuf, Sequence,
        Target, Transaction, TxIn, TxMerkleNode, TxOut, Txid, VarInt, Witness, Wtxid,
        block::{self, Header},
        consensus::{self, encode},
        hashes::{Hash, sha256d},
        locktime::absolute::LockTime,
        script::write_scriptint,
    },
    block_template::BlockTemplate,
    chain::Chain,
    clap::Parser,
    coinbase_builder::{CoinbaseBuilder, Payout, subsidy},
    difficulty::Difficulty,
    events::BlockFound,
    futures::{sink::SinkExt, stream::StreamExt},
    generator::Generator,
    hash_rate::HashRate,
    job::Job,
    jobs::Jobs,
    options::Options,
    registry::JobRegistry,
    rpc::BitcoinRpc,
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
        ser::SerializeSeq,
    },
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    stats::PoolStats,
    std::{
        collections::{BTreeMap, HashMap, HashSet, VecDeque},
        env,
        fmt::{self, Display, Formatter},
        io,
        net::SocketAddr,
        num::NonZeroUsize,
        path::PathBuf,
        process,
        str::FromStr,
        sync::{
            Arc, LazyLock, Mutex,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    store::{
        AddressSettingsStore, BlockRecord, BlockStore, ClientRecord, ClientStore, StatisticsStore,
        Stores, SubmissionRecord,
    },
    stratum::{
        Authorize, Configure, Extranonce, Id, JobId, MerkleNode, Message, Nbits, Nonce, Notify,
        Ntime, PrevHash, SetDifficulty, StratumError, Submit, Subscribe, SubscribeResult,
        SuggestDifficulty, Username, Version,
    },
    tokio::{
        io::{AsyncRead, AsyncWrite},
        net::TcpListener,
        runtime::Runtime,
        sync::{broadcast, watch},
        task::{self, JoinHandle},
        time::{MissedTickBehavior, interval},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::EnvFilter,
    vardiff::Vardiff,
    workbase::Workbase,
};

pub mod accounting;
mod arguments;
pub mod block_template;
pub mod chain;
pub mod coinbase_builder;
pub mod difficulty;
pub mod events;
mod generator;
pub mod hash_rate;
pub mod job;
pub mod jobs;
pub mod options;
pub mod registry;
pub mod rpc;
pub mod session;
mod signal;
pub mod stats;
pub mod store;
pub mod stratum;
pub mod subcommand;
pub mod vardiff;
pub mod workbase;

pub const COIN_VALUE: u64 = 100_000_000;
pub const USER_AGENT: &str = "stope/0.1.0";

pub const EXTRANONCE1_SIZE: usize = 4;
pub const EXTRANONCE2_SIZE: usize = 4;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;
/// Subscription IDs carry no meaning in Stratum V1, hardcoding for now.
pub const SUBSCRIPTION_ID: &str = "f00dbabe";

/// Starting share difficulty handed to new sessions.
pub const DEFAULT_DIFFICULTY: f64 = 16384.0;
/// cpuminer chokes on anything higher.
pub const CPUMINER_DIFFICULTY: f64 = 0.1;
/// Lowest difficulty vardiff will ever assign.
pub const MINIMUM_DIFFICULTY: f64 = 0.000001;

/// Dev fee kicks in above this hash rate, when an address is configured.
pub const DEV_FEE_THRESHOLD: f64 = 50e12;
/// 1.5% expressed in basis points.
pub const DEV_FEE_BASIS_POINTS: u16 = 150;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn main() {
    let (writer, _guard) = non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(writer)
        .init();

    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::setup_signal_handler();

            match args.run(cancel_token).await {
                Err(err) => {
                    error!("error: {err}");

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        error!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}

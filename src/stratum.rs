use super::*;

use snafu::Snafu;

mod authorize;
mod configure;
mod error;
mod extranonce;
mod job_id;
mod merkle;
mod message;
mod nbits;
mod nonce;
mod notify;
mod ntime;
mod prevhash;
mod set_difficulty;
mod submit;
mod subscribe;
mod suggest_difficulty;
mod username;
mod version;

pub use {
    authorize::Authorize,
    configure::Configure,
    error::{InternalError, JsonRpcError, StratumError},
    extranonce::Extranonce,
    job_id::JobId,
    merkle::{MerkleNode, coinbase_txid, fold_branches, merkle_branches},
    message::{Id, Message},
    nbits::Nbits,
    nonce::Nonce,
    notify::Notify,
    ntime::Ntime,
    prevhash::PrevHash,
    set_difficulty::SetDifficulty,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
    suggest_difficulty::SuggestDifficulty,
    username::Username,
    version::Version,
};

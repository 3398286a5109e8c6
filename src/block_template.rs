use super::*;

/// The relevant subset of a `getblocktemplate` result.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct BlockTemplate {
    pub bits: Nbits,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    #[serde(rename = "curtime")]
    pub current_time: u64,
    pub height: u64,
    #[serde(deserialize_with = "version_from_i32")]
    pub version: Version,
    pub transactions: Vec<TemplateTransaction>,
    #[serde(with = "bitcoin::script::ScriptBuf", default)]
    pub default_witness_commitment: ScriptBuf,
    #[serde(default)]
    pub coinbaseaux: BTreeMap<String, String>,
    #[serde(
        rename = "coinbasevalue",
        with = "bitcoin::amount::serde::as_sat",
        default
    )]
    pub coinbase_value: Amount,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct TemplateTransaction {
    pub txid: Txid,
    #[serde(rename = "hash")]
    pub wtxid: Wtxid,
    #[serde(with = "bitcoin::amount::serde::as_sat", default)]
    pub fee: Amount,
    #[serde(default)]
    pub weight: u64,
    #[serde(rename = "data", deserialize_with = "tx_from_hex")]
    pub transaction: Transaction,
}

impl BlockTemplate {
    pub fn network_difficulty(&self) -> Difficulty {
        Difficulty::from_nbits(self.bits)
    }

    pub fn target(&self) -> Target {
        self.bits.target()
    }

    /// True when this template builds on a different tip than `previous`,
    /// which obsoletes every outstanding job.
    pub fn is_new_tip(&self, previous: Option<&BlockTemplate>) -> bool {
        previous.is_none_or(|previous| previous.previous_block_hash != self.previous_block_hash)
    }

    pub fn txids(&self) -> Vec<Txid> {
        self.transactions.iter().map(|tx| tx.txid).collect()
    }

    pub fn total_fees(&self) -> Amount {
        self.transactions
            .iter()
            .map(|tx| tx.fee)
            .sum::<Amount>()
    }

    /// Total coinbase reward: the template's value when present, otherwise
    /// subsidy plus fees.
    pub fn reward(&self) -> Amount {
        if self.coinbase_value > Amount::ZERO {
            self.coinbase_value
        } else {
            subsidy(self.height) + self.total_fees()
        }
    }
}

impl Default for BlockTemplate {
    fn default() -> Self {
        Self {
            bits: "1d00ffff".parse().expect("valid nbits"),
            previous_block_hash: BlockHash::all_zeros(),
            current_time: 1231006505,
            height: 0,
            version: Version::from(0x2000_0000),
            transactions: Vec::new(),
            default_witness_commitment: ScriptBuf::new(),
            coinbaseaux: BTreeMap::new(),
            coinbase_value: Amount::from_sat(50 * COIN_VALUE),
        }
    }
}

fn version_from_i32<'de, D>(d: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let version = i32::deserialize(d)?;
    Ok(Version::from(version))
}

fn tx_from_hex<'de, D>(d: D) -> Result<Transaction, D::Error>
where
    D: Deserializer<'de>,
{
    let s = <&str>::deserialize(d)?;
    encode::deserialize_hex(s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_core_template_fields() {
        let template: BlockTemplate = serde_json::from_value(json!({
            "bits": "1d00ffff",
            "previousblockhash": "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
            "curtime": 1622505600,
            "height": 123456,
            "version": 0x20000000,
            "transactions": [],
            "coinbaseaux": {},
            "coinbasevalue": 625000000u64,
        }))
        .unwrap();

        assert_eq!(template.height, 123456);
        assert_eq!(template.coinbase_value, Amount::from_sat(625_000_000));
        assert_eq!(template.version, Version::from(0x2000_0000));
        assert!(template.transactions.is_empty());
    }

    #[test]
    fn genesis_template_has_difficulty_one() {
        let template = BlockTemplate::default();
        assert!((template.network_difficulty().as_f64() - 1.0).abs() < 1e-9);
        assert_eq!(template.target(), Target::MAX);
    }

    #[test]
    fn new_tip_detection() {
        let first = BlockTemplate::default();
        assert!(first.is_new_tip(None), "first template always cleans");

        let same_tip = BlockTemplate {
            height: 1,
            ..BlockTemplate::default()
        };
        assert!(!same_tip.is_new_tip(Some(&first)));

        let new_tip = BlockTemplate {
            previous_block_hash: BlockHash::from_byte_array([7; 32]),
            ..BlockTemplate::default()
        };
        assert!(new_tip.is_new_tip(Some(&first)));
    }

    #[test]
    fn total_fees_sums_transactions() {
        let raw_tx = format!(
            "0100000001{}ffffffff0151ffffffff0100f2052a010000000000000000",
            "00".repeat(32),
        );
        let raw_tx = raw_tx.as_str();

        let template: BlockTemplate = serde_json::from_value(json!({
            "bits": "1d00ffff",
            "previousblockhash": "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
            "curtime": 1622505600,
            "height": 1,
            "version": 0x20000000,
            "transactions": [
                {
                    "txid": "1111111111111111111111111111111111111111111111111111111111111111",
                    "hash": "1111111111111111111111111111111111111111111111111111111111111111",
                    "fee": 1000u64,
                    "weight": 400u64,
                    "data": raw_tx,
                },
                {
                    "txid": "2222222222222222222222222222222222222222222222222222222222222222",
                    "hash": "2222222222222222222222222222222222222222222222222222222222222222",
                    "fee": 2500u64,
                    "weight": 800u64,
                    "data": raw_tx,
                }
            ],
        }))
        .unwrap();

        assert_eq!(template.total_fees(), Amount::from_sat(3500));
        assert_eq!(template.txids().len(), 2);
    }
}

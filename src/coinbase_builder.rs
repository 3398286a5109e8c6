use {super::*, bitcoin::transaction};

/// One coinbase output share, in basis points of the total reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub address: Address,
    pub basis_points: u16,
}

impl Payout {
    pub fn whole(address: Address) -> Vec<Payout> {
        vec![Payout {
            address,
            basis_points: 10_000,
        }]
    }

    /// Dev fee first, miner takes the remainder and absorbs rounding.
    pub fn with_dev_fee(miner: Address, dev: Address, dev_basis_points: u16) -> Vec<Payout> {
        vec![
            Payout {
                address: dev,
                basis_points: dev_basis_points,
            },
            Payout {
                address: miner,
                basis_points: 10_000 - dev_basis_points,
            },
        ]
    }
}

/// Block subsidy at `height`: 50 BTC halved every 210 000 blocks until the
/// shift exhausts.
pub fn subsidy(height: u64) -> Amount {
    let halvings = height / 210_000;
    Amount::from_sat(
        (50 * COIN_VALUE)
            .checked_shr(halvings.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(0),
    )
}

/// Builds the coinbase transaction and splits its serialization around an
/// extranonce window of `EXTRANONCE1_SIZE + EXTRANONCE2_SIZE` zero bytes, so
/// that `coinb1 ‖ extranonce1 ‖ extranonce2 ‖ coinb2` is a valid transaction.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    payouts: Vec<Payout>,
    height: u64,
    value: Amount,
    aux: BTreeMap<String, String>,
    witness_commitment: ScriptBuf,
    extranonce_size: usize,
}

impl CoinbaseBuilder {
    pub const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

    const TAG: &'static [u8] = b"|stope|";

    pub fn new(payouts: Vec<Payout>, height: u64, value: Amount) -> Self {
        Self {
            payouts,
            height,
            value,
            aux: BTreeMap::new(),
            witness_commitment: ScriptBuf::new(),
            extranonce_size: EXTRANONCE1_SIZE + EXTRANONCE2_SIZE,
        }
    }

    pub fn with_aux(mut self, aux: BTreeMap<String, String>) -> Self {
        self.aux = aux;
        self
    }

    pub fn with_witness_commitment(mut self, witness_commitment: ScriptBuf) -> Self {
        self.witness_commitment = witness_commitment;
        self
    }

    /// Splits `value` by basis points, flooring each share; the last payout
    /// absorbs the rounding residue so the sum is exact.
    fn outputs(&self) -> Result<Vec<TxOut>> {
        ensure!(!self.payouts.is_empty(), "coinbase needs at least one payout");

        let total_basis_points: u32 = self
            .payouts
            .iter()
            .map(|payout| u32::from(payout.basis_points))
            .sum();

        ensure!(
            total_basis_points == 10_000,
            "payout shares sum to {total_basis_points} basis points, expected 10000"
        );

        let total = self.value.to_sat();

        let mut values = self
            .payouts
            .iter()
            .map(|payout| (u128::from(total) * u128::from(payout.basis_points) / 10_000) as u64)
            .collect::<Vec<u64>>();

        let assigned: u64 = values.iter().sum();
        *values.last_mut().expect("payouts is non-empty") += total - assigned;

        let mut outputs = self
            .payouts
            .iter()
            .zip(values)
            .map(|(payout, value)| TxOut {
                value: Amount::from_sat(value),
                script_pubkey: payout.address.script_pubkey(),
            })
            .collect::<Vec<TxOut>>();

        if !self.witness_commitment.is_empty() {
            outputs.push(TxOut {
                value: Amount::ZERO,
                script_pubkey: self.witness_commitment.clone(),
            });
        }

        Ok(outputs)
    }

    pub fn build(self) -> Result<(Transaction, String, String)> {
        let mut buf: Vec<u8> = Vec::with_capacity(Self::MAX_COINBASE_SCRIPT_SIG_SIZE);

        // BIP34 minimal height push.
        let mut height_bytes = [0u8; 8];
        let height_len = write_scriptint(
            &mut height_bytes,
            self.height.try_into().context("height overflows scriptint")?,
        );
        buf.push(height_len as u8);
        buf.extend_from_slice(&height_bytes[..height_len]);

        for value in self.aux.values() {
            buf.extend_from_slice(hex::decode(value)?.as_slice());
        }

        buf.extend_from_slice(Self::TAG);

        let script_prefix_size = buf.len();

        buf.extend_from_slice(&vec![0u8; self.extranonce_size]);

        let script_sig = ScriptBuf::from_bytes(buf);
        let script_sig_size = script_sig.len();

        ensure!(
            script_sig_size <= Self::MAX_COINBASE_SCRIPT_SIG_SIZE,
            "script sig is {script_sig_size} bytes (max {})",
            Self::MAX_COINBASE_SCRIPT_SIG_SIZE
        );

        let outputs = self.outputs()?;

        let coinbase = Transaction {
            version: transaction::Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig,
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: outputs,
        };

        // offset = tx version
        //  + input count varint
        //  + coinbase outpoint
        //  + scriptSig length varint
        //  + script bytes preceding the extranonce window
        let offset = 4
            + VarInt(coinbase.input.len() as u64).size()
            + 36
            + VarInt(script_sig_size as u64).size()
            + script_prefix_size;

        let bin = consensus::serialize(&coinbase);
        let coinb1 = hex::encode(&bin[..offset]);
        let coinb2 = hex::encode(&bin[offset + self.extranonce_size..]);

        Ok((coinbase, coinb1, coinb2))
    }
}

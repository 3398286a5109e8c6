use super::*;

/// A job as announced to one session: the shared workbase plus the session's
/// coinbase halves, which embed its payout outputs. Frozen at construction;
/// submissions only ever read from it.
#[derive(Debug)]
pub struct Job {
    pub job_id: JobId,
    pub coinb1: String,
    pub coinb2: String,
    pub enonce1: Extranonce,
    pub version_mask: Option<Version>,
    pub workbase: Arc<Workbase>,
}

impl Job {
    pub fn new(
        workbase: Arc<Workbase>,
        job_id: JobId,
        payouts: Vec<Payout>,
        enonce1: Extranonce,
        version_mask: Option<Version>,
    ) -> Result<Self> {
        let template = &workbase.template;

        let (_coinbase, coinb1, coinb2) =
            CoinbaseBuilder::new(payouts, template.height, template.reward())
                .with_aux(template.coinbaseaux.clone())
                .with_witness_commitment(template.default_witness_commitment.clone())
                .build()?;

        Ok(Self {
            job_id,
            coinb1,
            coinb2,
            enonce1,
            version_mask,
            workbase,
        })
    }

    pub fn version(&self) -> Version {
        self.workbase.template.version
    }

    pub fn nbits(&self) -> Nbits {
        self.workbase.template.bits
    }

    pub fn ntime(&self) -> Ntime {
        self.workbase.ntime
    }

    pub fn prevhash(&self) -> PrevHash {
        self.workbase.prevhash()
    }

    pub fn notify(&self, clean_jobs: bool) -> Notify {
        Notify {
            job_id: self.job_id,
            prevhash: self.prevhash(),
            coinb1: self.coinb1.clone(),
            coinb2: self.coinb2.clone(),
            merkle_branches: self.workbase.merkle_branches.clone(),
            version: self.version(),
            nbits: self.nbits(),
            ntime: self.ntime(),
            clean_jobs,
        }
    }

    /// Rebuild the 80-byte header for a submission: roll the version within
    /// the negotiated mask, fold the reassembled coinbase txid through the
    /// merkle branches, and take ntime and nonce from the miner.
    pub fn header(&self, submit: &Submit) -> Result<Header> {
        let version = match (submit.version_bits, self.version_mask) {
            (Some(bits), Some(mask)) => self.version().roll(bits, mask),
            _ => self.version(),
        };

        let coinbase_txid = stratum::coinbase_txid(
            &self.coinb1,
            &self.coinb2,
            &self.enonce1,
            &submit.extranonce2,
        )?;

        let merkle_root =
            stratum::fold_branches(coinbase_txid, &self.workbase.merkle_branches);

        Ok(Header {
            version: version.into(),
            prev_blockhash: self.workbase.template.previous_block_hash,
            merkle_root: merkle_root.into(),
            time: submit.ntime.into(),
            bits: self.nbits().into(),
            nonce: submit.nonce.into(),
        })
    }

    /// The full block for a solving submission: the reassembled coinbase
    /// followed by the template's transactions in order.
    pub fn assemble_block(&self, submit: &Submit, header: Header) -> Result<Block> {
        let coinbase_bin = hex::decode(format!(
            "{}{}{}{}",
            self.coinb1, self.enonce1, submit.extranonce2, self.coinb2,
        ))?;

        let coinbase: Transaction = encode::deserialize(&coinbase_bin)?;

        let txdata = std::iter::once(coinbase)
            .chain(
                self.workbase
                    .template
                    .transactions
                    .iter()
                    .map(|tx| tx.transaction.clone()),
            )
            .collect();

        Ok(Block { header, txdata })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, bitcoin::address::NetworkUnchecked};

    fn payout() -> Vec<Payout> {
        Payout::whole(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
                .parse::<Address<NetworkUnchecked>>()
                .unwrap()
                .assume_checked(),
        )
    }

    fn job() -> Job {
        let workbase = Arc::new(Workbase::new(BlockTemplate::default(), JobId::new(7), true));
        Job::new(
            workbase,
            JobId::new(7),
            payout(),
            Extranonce::from_bytes(&[0xaa, 0xbb, 0xcc, 0xdd]),
            Some("1fffe000".parse().unwrap()),
        )
        .unwrap()
    }

    fn submit(nonce: u32) -> Submit {
        Submit {
            username: "u".into(),
            job_id: JobId::new(7),
            extranonce2: Extranonce::from_bytes(&[0, 0, 0, 1]),
            ntime: "504e86b9".parse().unwrap(),
            nonce: Nonce::from(nonce),
            version_bits: None,
        }
    }

    #[test]
    fn notify_mirrors_job_fields() {
        let job = job();
        let notify = job.notify(true);

        assert_eq!(notify.job_id, job.job_id);
        assert_eq!(notify.coinb1, job.coinb1);
        assert_eq!(notify.coinb2, job.coinb2);
        assert_eq!(notify.version, job.version());
        assert_eq!(notify.nbits, job.nbits());
        assert_eq!(notify.ntime, job.ntime());
        assert!(notify.clean_jobs);
    }

    #[test]
    fn header_is_eighty_bytes() {
        let header = job().header(&submit(42)).unwrap();
        assert_eq!(consensus::serialize(&header).len(), 80);
    }

    #[test]
    fn header_fields_come_from_job_and_submission() {
        let job = job();
        let submission = submit(0xdeadbeef);
        let header = job.header(&submission).unwrap();

        assert_eq!(header.version, job.version().into());
        assert_eq!(
            header.prev_blockhash,
            job.workbase.template.previous_block_hash
        );
        assert_eq!(header.time, 0x504e86b9);
        assert_eq!(header.nonce, 0xdeadbeef);
        assert_eq!(header.bits, job.nbits().to_compact());
    }

    #[test]
    fn merkle_root_is_coinbase_txid_when_no_transactions() {
        let job = job();
        let submission = submit(1);
        let header = job.header(&submission).unwrap();

        let expected = stratum::coinbase_txid(
            &job.coinb1,
            &job.coinb2,
            &job.enonce1,
            &submission.extranonce2,
        )
        .unwrap();

        assert_eq!(header.merkle_root, TxMerkleNode::from_raw_hash(expected));
    }

    #[test]
    fn version_rolling_respects_mask() {
        let job = job();

        let mut submission = submit(1);
        submission.version_bits = Some("1fffe000".parse().unwrap());

        let header = job.header(&submission).unwrap();
        assert_eq!(
            Version::from(header.version),
            job.version().roll("1fffe000".parse().unwrap(), "1fffe000".parse().unwrap())
        );
    }

    #[test]
    fn version_bits_ignored_without_negotiated_mask() {
        let workbase = Arc::new(Workbase::new(BlockTemplate::default(), JobId::new(1), true));
        let job = Job::new(
            workbase,
            JobId::new(1),
            payout(),
            Extranonce::zeros(4),
            None,
        )
        .unwrap();

        let mut submission = submit(1);
        submission.version_bits = Some("ffffffff".parse().unwrap());

        let header = job.header(&submission).unwrap();
        assert_eq!(Version::from(header.version), job.version());
    }

    #[test]
    fn assembled_block_contains_coinbase_first() {
        let job = job();
        let submission = submit(5);
        let header = job.header(&submission).unwrap();
        let block = job.assemble_block(&submission, header).unwrap();

        assert_eq!(block.header, header);
        assert_eq!(block.txdata.len(), 1);
        assert!(block.txdata[0].is_coinbase());
    }

    #[test]
    fn assembled_coinbase_txid_matches_merkle_leaf() {
        let job = job();
        let submission = submit(5);
        let header = job.header(&submission).unwrap();
        let block = job.assemble_block(&submission, header).unwrap();

        assert_eq!(
            block.txdata[0].compute_txid().to_raw_hash(),
            stratum::coinbase_txid(
                &job.coinb1,
                &job.coinb2,
                &job.enonce1,
                &submission.extranonce2,
            )
            .unwrap(),
        );
    }

    #[test]
    fn share_difficulty_orders_inversely_to_hash_value() {
        let job = job();

        let headers = [0u32, 1, 2, 0xffffffff]
            .map(|nonce| job.header(&submit(nonce)).unwrap().block_hash());

        for pair in headers.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert_eq!(
                difficulty::hash_value(a) < difficulty::hash_value(b),
                Difficulty::from_hash(a) > Difficulty::from_hash(b),
            );
        }
    }
}

use super::*;

/// `mining.notify` parameters, serialized as the 9-element positional array.
#[derive(Debug, PartialEq, Clone)]
pub struct Notify {
    pub job_id: JobId,
    pub prevhash: PrevHash,
    pub coinb1: String,
    pub coinb2: String,
    pub merkle_branches: Vec<MerkleNode>,
    pub version: Version,
    pub nbits: Nbits,
    pub ntime: Ntime,
    pub clean_jobs: bool,
}

impl Serialize for Notify {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(9))?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.prevhash)?;
        seq.serialize_element(&self.coinb1)?;
        seq.serialize_element(&self.coinb2)?;
        seq.serialize_element(&self.merkle_branches)?;
        seq.serialize_element(&self.version)?;
        seq.serialize_element(&self.nbits)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.clean_jobs)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Notify {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (job_id, prevhash, coinb1, coinb2, merkle_branches, version, nbits, ntime, clean_jobs) =
            <(
                JobId,
                PrevHash,
                String,
                String,
                Vec<MerkleNode>,
                Version,
                Nbits,
                Ntime,
                bool,
            )>::deserialize(deserializer)?;

        Ok(Notify {
            job_id,
            prevhash,
            coinb1,
            coinb2,
            merkle_branches,
            version,
            nbits,
            ntime,
            clean_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notify {
        Notify {
            job_id: JobId::new(0xbf),
            prevhash: "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
                .parse()
                .unwrap(),
            coinb1: "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff".into(),
            coinb2: "ffffffff0100f2052a0100000000000000".into(),
            merkle_branches: Vec::new(),
            version: "20000000".parse().unwrap(),
            nbits: "1d00ffff".parse().unwrap(),
            ntime: "504e86b9".parse().unwrap(),
            clean_jobs: true,
        }
    }

    #[test]
    fn serializes_as_positional_array() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(
            value,
            json!([
                "bf",
                "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
                "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff",
                "ffffffff0100f2052a0100000000000000",
                [],
                "20000000",
                "1d00ffff",
                "504e86b9",
                true
            ])
        );
    }

    #[test]
    fn roundtrip() {
        let notify = sample();
        let serialized = serde_json::to_string(&notify).unwrap();
        assert_eq!(serde_json::from_str::<Notify>(&serialized).unwrap(), notify);
    }

    #[test]
    fn rejects_bad_arity() {
        assert!(serde_json::from_str::<Notify>(r#"["bf","00"]"#).is_err());
    }
}

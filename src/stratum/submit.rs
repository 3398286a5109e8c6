use super::*;

/// `mining.submit` parameters. The sixth element carries rolled version bits
/// when the miner negotiated version rolling.
#[derive(Debug, PartialEq, Clone)]
pub struct Submit {
    pub username: Username,
    pub job_id: JobId,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
    pub version_bits: Option<Version>,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.version_bits.is_some() { 6 } else { 5 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        if let Some(version_bits) = &self.version_bits {
            seq.serialize_element(version_bits)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Five((Username, JobId, Extranonce, Ntime, Nonce)),
            Six((Username, JobId, Extranonce, Ntime, Nonce, Option<Version>)),
        }

        let (username, job_id, extranonce2, ntime, nonce, version_bits) =
            match Raw::deserialize(deserializer)? {
                Raw::Five((username, job_id, extranonce2, ntime, nonce)) => {
                    (username, job_id, extranonce2, ntime, nonce, None)
                }
                Raw::Six((username, job_id, extranonce2, ntime, nonce, version_bits)) => {
                    (username, job_id, extranonce2, ntime, nonce, version_bits)
                }
            };

        Ok(Submit {
            username,
            job_id,
            extranonce2,
            ntime,
            nonce,
            version_bits,
        })
    }
}

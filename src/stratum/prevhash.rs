use super::*;

/// Previous block hash as carried in `mining.notify`: the same hex the node
/// reports from `getblocktemplate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct PrevHash(BlockHash);

impl FromStr for PrevHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PrevHash(s.parse::<BlockHash>()?))
    }
}

impl Display for PrevHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BlockHash> for PrevHash {
    fn from(hash: BlockHash) -> Self {
        PrevHash(hash)
    }
}

impl From<PrevHash> for BlockHash {
    fn from(prevhash: PrevHash) -> Self {
        prevhash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let hex = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let prevhash = hex.parse::<PrevHash>().unwrap();
        assert_eq!(prevhash.to_string(), hex);
        assert_eq!(
            BlockHash::from(prevhash),
            hex.parse::<BlockHash>().unwrap()
        );
    }

    #[test]
    fn serde_as_display_hex() {
        let hex = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let prevhash = hex.parse::<PrevHash>().unwrap();
        assert_eq!(
            serde_json::to_string(&prevhash).unwrap(),
            format!("\"{hex}\"")
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("xyz".parse::<PrevHash>().is_err());
        assert!("00".parse::<PrevHash>().is_err());
    }
}

use {super::*, rand::RngCore};

/// An opaque byte string spliced into the coinbase: the pool picks
/// extranonce1 per session, the miner rolls extranonce2.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Extranonce(Vec<u8>);

impl Extranonce {
    pub fn random(size: usize) -> Self {
        let mut bytes = vec![0u8; size];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn zeros(size: usize) -> Self {
        Self(vec![0u8; size])
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Serialize for Extranonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Extranonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Display for Extranonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Extranonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = snafu::ResultExt::context(hex::decode(s), error::HexParseSnafu)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_odd_length_hex() {
        assert!(
            "abc"
                .parse::<Extranonce>()
                .unwrap_err()
                .to_string()
                .contains("Odd number of digits")
        );
    }

    #[test]
    fn rejects_non_hex() {
        assert!(
            "zz".parse::<Extranonce>()
                .unwrap_err()
                .to_string()
                .contains("Invalid character")
        );
    }

    #[test]
    fn hex_roundtrip() {
        let extranonce: Extranonce = serde_json::from_str(r#""abcd""#).unwrap();
        assert_eq!(extranonce.len(), 2);
        assert_eq!(extranonce.to_hex(), "abcd");
        assert_eq!(serde_json::to_string(&extranonce).unwrap(), r#""abcd""#);
    }

    #[test]
    fn random_has_requested_length() {
        assert_eq!(Extranonce::random(EXTRANONCE1_SIZE).len(), EXTRANONCE1_SIZE);
        assert_eq!(Extranonce::random(8).len(), 8);
    }

    #[test]
    fn zeros() {
        assert_eq!(Extranonce::zeros(4).to_hex(), "00000000");
    }

    #[test]
    fn from_bytes_roundtrip() {
        let extranonce = Extranonce::from_bytes(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(extranonce.to_hex(), "deadbeef");
        assert_eq!(extranonce.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
    }
}

use {super::*, primitive_types::U256};

/// The difficulty-1 target 0x00000000FFFF0000...0000 as an integer. Share and
/// network difficulties are quotients of this constant and a 256-bit hash or
/// target value.
pub static DIFFICULTY_1_TARGET: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

/// A block hash read as an unsigned 256-bit little-endian integer, the value
/// compared against targets.
pub fn hash_value(hash: BlockHash) -> U256 {
    U256::from_little_endian(&hash.to_byte_array())
}

/// Expands Bitcoin's compact target encoding: the top byte is a base-256
/// exponent, the remaining three bytes the mantissa. The sign bit is masked
/// off, negative targets do not occur in headers.
pub fn compact_target_value(nbits: Nbits) -> U256 {
    let consensus = nbits.to_consensus();
    let exponent = (consensus >> 24) as usize;
    let mantissa = U256::from(consensus & 0x007f_ffff);

    if mantissa.is_zero() {
        U256::zero()
    } else if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else if exponent <= 32 {
        mantissa << (8 * (exponent - 3))
    } else {
        // Would not fit in 256 bits; treat as an unreachable, trivially easy target.
        U256::MAX
    }
}

/// Lossy but monotone conversion, exact for values of 53 bits or fewer.
fn u256_to_f64(value: U256) -> f64 {
    let bits = value.bits();
    if bits <= 64 {
        value.low_u64() as f64
    } else {
        let shift = bits - 53;
        let mantissa = (value >> shift).low_u64();
        mantissa as f64 * (shift as f64).exp2()
    }
}

/// Difficulty as used on the stratum wire and in share accounting: the
/// difficulty-1 target divided by a hash or target value. Exact integer
/// comparisons against the network target never go through this type, they
/// use [`Target::is_met_by`] on the raw values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Difficulty(f64);

impl Difficulty {
    pub fn new(difficulty: f64) -> Self {
        assert!(
            difficulty.is_finite() && difficulty > 0.0,
            "difficulty must be finite and > 0"
        );
        Self(difficulty)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// The difficulty a header hash achieves.
    pub fn from_hash(hash: BlockHash) -> Self {
        let value = hash_value(hash).max(U256::one());
        Self(u256_to_f64(*DIFFICULTY_1_TARGET) / u256_to_f64(value))
    }

    /// The network difficulty a compact target encodes.
    pub fn from_nbits(nbits: Nbits) -> Self {
        let target = compact_target_value(nbits).max(U256::one());
        Self(u256_to_f64(*DIFFICULTY_1_TARGET) / u256_to_f64(target))
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 >= 1.0 && self.0.fract() == 0.0 && self.0 <= u64::MAX as f64 {
            serializer.serialize_u64(self.0 as u64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(u64),
            Float(f64),
        }

        let difficulty = match Wire::deserialize(deserializer)? {
            Wire::Int(u) => u as f64,
            Wire::Float(x) => x,
        };

        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(de::Error::custom("difficulty must be finite and > 0"));
        }

        Ok(Difficulty(difficulty))
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0 >= 1.0 && self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as u64)
        } else {
            let s = format!("{:.8}", self.0);
            f.write_str(s.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let difficulty = s.trim().parse::<f64>().context("invalid difficulty")?;
        ensure!(
            difficulty.is_finite() && difficulty > 0.0,
            "difficulty must be finite and > 0"
        );
        Ok(Difficulty(difficulty))
    }
}

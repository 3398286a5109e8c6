use super::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, DeserializeFromStr, SerializeDisplay,
)]
pub struct Ntime(u32);

impl FromStr for Ntime {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let time = u32::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid ntime hex string '{s}': {e}"),
        })?;
        Ok(Ntime(time))
    }
}

impl Display for Ntime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Ntime {
    fn from(n: u32) -> Ntime {
        Ntime(n)
    }
}

impl From<Ntime> for u32 {
    fn from(n: Ntime) -> u32 {
        n.0
    }
}

impl TryFrom<u64> for Ntime {
    type Error = <u32 as TryFrom<u64>>::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(Ntime(u32::try_from(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!("504e86b9".parse::<Ntime>().unwrap().to_string(), "504e86b9");
        assert_eq!(Ntime::from(0).to_string(), "00000000");
    }

    #[test]
    fn from_u64() {
        assert!(Ntime::try_from(u64::from(u32::MAX)).is_ok());
        assert!(Ntime::try_from(u64::from(u32::MAX) + 1).is_err());
    }
}

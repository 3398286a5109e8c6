use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Nonce(u32);

impl FromStr for Nonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nonce = u32::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid nonce hex string '{s}': {e}"),
        })?;
        Ok(Nonce(nonce))
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Nonce {
    fn from(n: u32) -> Nonce {
        Nonce(n)
    }
}

impl From<Nonce> for u32 {
    fn from(n: Nonce) -> u32 {
        n.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(Nonce::from(u32::MAX).to_string(), "ffffffff");
        assert_eq!("00000000".parse::<Nonce>().unwrap(), Nonce::from(0));
        assert_eq!(
            "b2957c02".parse::<Nonce>().unwrap(),
            Nonce::from(0xb2957c02)
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<Nonce>().is_err());
        assert!("123456789".parse::<Nonce>().is_err());
        assert!("xyz".parse::<Nonce>().is_err());
    }
}

use {super::*, clap::ValueEnum};

#[derive(
    Default, ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    #[value(alias = "main")]
    Mainnet,
    #[value(alias = "test")]
    Testnet,
    Regtest,
}

impl Chain {
    pub fn network(self) -> Network {
        match self {
            Self::Mainnet => Network::Bitcoin,
            Self::Testnet => Network::Testnet,
            Self::Regtest => Network::Regtest,
        }
    }

    pub fn default_rpc_port(self) -> u16 {
        match self {
            Self::Mainnet => 8332,
            Self::Testnet => 18332,
            Self::Regtest => 18443,
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Mainnet => "mainnet",
                Self::Testnet => "testnet",
                Self::Regtest => "regtest",
            }
        )
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            _ => bail!("invalid chain `{s}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert_eq!("mainnet".parse::<Chain>().unwrap(), Chain::Mainnet);
        assert_eq!("testnet".parse::<Chain>().unwrap(), Chain::Testnet);
        assert_eq!("regtest".parse::<Chain>().unwrap(), Chain::Regtest);
        assert!("signet".parse::<Chain>().is_err());
    }

    #[test]
    fn display_roundtrip() {
        for chain in [Chain::Mainnet, Chain::Testnet, Chain::Regtest] {
            assert_eq!(chain.to_string().parse::<Chain>().unwrap(), chain);
        }
    }

    #[test]
    fn rpc_ports() {
        assert_eq!(Chain::Mainnet.default_rpc_port(), 8332);
        assert_eq!(Chain::Testnet.default_rpc_port(), 18332);
        assert_eq!(Chain::Regtest.default_rpc_port(), 18443);
    }
}

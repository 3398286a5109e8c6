use {super::*, bitcoin::address::NetworkUnchecked, bitcoincore_rpc::Auth};

#[derive(Clone, Default, Debug, Parser)]
#[command(group(
    clap::ArgGroup::new("chains")
        .required(false)
        .args(&["chain", "regtest", "testnet"]),
))]
pub struct Options {
    #[arg(
        long = "chain",
        value_enum,
        env = "NETWORK",
        help = "Mine on <CHAIN>. [default: mainnet]"
    )]
    pub chain: Option<Chain>,

    #[arg(
        long,
        short = 't',
        help = "Use testnet. Equivalent to `--chain testnet`."
    )]
    pub testnet: bool,

    #[arg(
        long,
        short = 'r',
        help = "Use regtest. Equivalent to `--chain regtest`."
    )]
    pub regtest: bool,

    #[arg(
        long,
        env = "DEV_FEE_ADDRESS",
        help = "Add a 1.5% dev fee output paying <DEV_FEE_ADDRESS>."
    )]
    pub dev_fee_address: Option<String>,

    #[arg(long, help = "Load Bitcoin Core data dir from <BITCOIN_DATA_DIR>.")]
    pub bitcoin_data_dir: Option<PathBuf>,

    #[arg(long, help = "Connect to Bitcoin Core RPC at <BITCOIN_RPC_PORT>.")]
    pub bitcoin_rpc_port: Option<u16>,

    #[arg(
        long,
        help = "Authenticate to Bitcoin Core RPC as <BITCOIN_RPC_USERNAME>."
    )]
    pub bitcoin_rpc_username: Option<String>,

    #[arg(
        long,
        help = "Authenticate to Bitcoin Core RPC with <BITCOIN_RPC_PASSWORD>."
    )]
    pub bitcoin_rpc_password: Option<String>,

    #[arg(
        long,
        help = "Load Bitcoin Core RPC cookie file from <BITCOIN_RPC_COOKIE_FILE>."
    )]
    pub bitcoin_rpc_cookie_file: Option<PathBuf>,
}

impl Options {
    pub fn chain(&self) -> Chain {
        if self.regtest {
            Chain::Regtest
        } else if self.testnet {
            Chain::Testnet
        } else {
            self.chain.unwrap_or_default()
        }
    }

    pub fn bitcoin_rpc_port(&self) -> u16 {
        self.bitcoin_rpc_port
            .unwrap_or_else(|| self.chain().default_rpc_port())
    }

    pub fn bitcoin_rpc_url(&self) -> String {
        format!("127.0.0.1:{}/", self.bitcoin_rpc_port())
    }

    pub fn cookie_file(&self) -> Result<PathBuf> {
        if let Some(cookie_file) = &self.bitcoin_rpc_cookie_file {
            return Ok(cookie_file.clone());
        }

        let path = self
            .bitcoin_data_dir
            .clone()
            .ok_or_else(|| anyhow!("no Bitcoin Core cookie file or data dir configured"))?;

        let path = match self.chain() {
            Chain::Mainnet => path,
            Chain::Testnet => path.join("testnet3"),
            Chain::Regtest => path.join("regtest"),
        };

        Ok(path.join(".cookie"))
    }

    pub fn bitcoin_credentials(&self) -> Result<Auth> {
        match (&self.bitcoin_rpc_username, &self.bitcoin_rpc_password) {
            (Some(username), Some(password)) => {
                Ok(Auth::UserPass(username.clone(), password.clone()))
            }
            _ => Ok(Auth::CookieFile(self.cookie_file()?)),
        }
    }

    /// The dev fee output address, checked against the configured network.
    /// An empty `DEV_FEE_ADDRESS` counts as unset.
    pub fn dev_fee_address(&self) -> Result<Option<Address>> {
        let Some(raw) = self.dev_fee_address.as_deref().map(str::trim) else {
            return Ok(None);
        };

        if raw.is_empty() {
            return Ok(None);
        }

        let address = raw
            .parse::<Address<NetworkUnchecked>>()
            .with_context(|| format!("invalid dev fee address `{raw}`"))?
            .require_network(self.chain().network())
            .with_context(|| format!("dev fee address `{raw}` is not valid for {}", self.chain()))?;

        Ok(Some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &str) -> Options {
        Options::try_parse_from(args.split_whitespace()).unwrap()
    }

    #[test]
    fn chain_defaults_to_mainnet() {
        assert_eq!(parse("stope").chain(), Chain::Mainnet);
    }

    #[test]
    fn chain_flags() {
        assert_eq!(parse("stope --testnet").chain(), Chain::Testnet);
        assert_eq!(parse("stope -r").chain(), Chain::Regtest);
        assert_eq!(parse("stope --chain testnet").chain(), Chain::Testnet);
    }

    #[test]
    fn rpc_port_follows_chain() {
        assert_eq!(parse("stope").bitcoin_rpc_port(), 8332);
        assert_eq!(parse("stope --regtest").bitcoin_rpc_port(), 18443);
        assert_eq!(
            parse("stope --bitcoin-rpc-port 4242").bitcoin_rpc_port(),
            4242
        );
    }

    #[test]
    fn credentials_userpass_when_both_provided() {
        let options = parse("stope --bitcoin-rpc-username alice --bitcoin-rpc-password hunter2");

        match options.bitcoin_credentials().unwrap() {
            Auth::UserPass(username, password) => {
                assert_eq!(username, "alice");
                assert_eq!(password, "hunter2");
            }
            other => panic!("expected UserPass, got {other:?}"),
        }
    }

    #[test]
    fn credentials_fall_back_to_cookie() {
        let options =
            parse("stope --bitcoin-rpc-username onlyuser --bitcoin-rpc-cookie-file /tmp/.cookie");

        match options.bitcoin_credentials().unwrap() {
            Auth::CookieFile(path) => assert_eq!(path, PathBuf::from("/tmp/.cookie")),
            other => panic!("expected CookieFile, got {other:?}"),
        }
    }

    #[test]
    fn cookie_file_from_data_dir_and_chain() {
        let options = parse("stope --bitcoin-data-dir /data/bitcoin --regtest");
        assert_eq!(
            options.cookie_file().unwrap(),
            PathBuf::from("/data/bitcoin/regtest/.cookie")
        );

        let options = parse("stope --bitcoin-data-dir /data/bitcoin");
        assert_eq!(
            options.cookie_file().unwrap(),
            PathBuf::from("/data/bitcoin/.cookie")
        );
    }

    #[test]
    fn dev_fee_address_unset_or_empty_is_none() {
        assert!(parse("stope").dev_fee_address().unwrap().is_none());
        assert!(
            parse("stope --dev-fee-address=")
                .dev_fee_address()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn dev_fee_address_network_checked() {
        let options =
            parse("stope --dev-fee-address bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert!(options.dev_fee_address().unwrap().is_some());

        let options =
            parse("stope --testnet --dev-fee-address bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert!(options.dev_fee_address().is_err());
    }

    #[test]
    fn dev_fee_address_rejects_garbage() {
        assert!(
            parse("stope --dev-fee-address notanaddress")
                .dev_fee_address()
                .is_err()
        );
    }
}

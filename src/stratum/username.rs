use {super::*, bitcoin::address::NetworkUnchecked};

/// The stratum username, conventionally `<payout address>.<worker name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn address_part(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// The worker name after the first dot, `default` when absent or empty.
    pub fn worker(&self) -> &str {
        match self.0.split_once('.') {
            Some((_, worker)) if !worker.is_empty() => worker,
            _ => "default",
        }
    }

    /// Parse the address part against the pool's network.
    pub fn address(&self, network: Network) -> Result<Address> {
        let raw = self.address_part();
        ensure!(!raw.is_empty(), "username has no address part");

        raw.parse::<Address<NetworkUnchecked>>()
            .with_context(|| format!("invalid payout address `{raw}`"))?
            .require_network(network)
            .with_context(|| format!("payout address `{raw}` is not valid for {network}"))
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Self(s)
    }
}

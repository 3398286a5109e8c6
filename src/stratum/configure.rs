use super::*;

/// `mining.configure` request: a list of requested extensions plus an options
/// object keyed by `<extension>.<option>`. Only `version-rolling` is
/// supported; unknown extensions and options are ignored.
#[derive(Debug, PartialEq, Clone)]
pub struct Configure {
    pub extensions: Vec<String>,
    pub version_rolling_mask: Option<Version>,
    pub version_rolling_min_bit_count: Option<u32>,
}

impl Configure {
    pub fn requests_version_rolling(&self) -> bool {
        self.extensions.iter().any(|e| e == "version-rolling")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigureOptions {
    #[serde(
        rename = "version-rolling.mask",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_mask: Option<Version>,

    #[serde(
        rename = "version-rolling.min-bit-count",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_min_bit_count: Option<u32>,
}

impl Serialize for Configure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let options = ConfigureOptions {
            version_rolling_mask: self.version_rolling_mask,
            version_rolling_min_bit_count: self.version_rolling_min_bit_count,
        };

        (&self.extensions, &options).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Configure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((Vec<String>,)),
            Two((Vec<String>, ConfigureOptions)),
        }

        let (extensions, options) = match Raw::deserialize(deserializer)? {
            Raw::One((extensions,)) => (extensions, ConfigureOptions::default()),
            Raw::Two((extensions, options)) => (extensions, options),
        };

        Ok(Configure {
            extensions,
            version_rolling_mask: options.version_rolling_mask,
            version_rolling_min_bit_count: options.version_rolling_min_bit_count,
        })
    }
}

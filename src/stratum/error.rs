use super::*;

/// Error codes sent to miners in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StratumError {
    Unknown = 20,
    JobNotFound = 21,
    DuplicateShare = 22,
    LowDifficultyShare = 23,
    Unauthorized = 24,
    NotSubscribed = 25,
}

impl Display for StratumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "Other/Unknown",
            Self::JobNotFound => "Job not found",
            Self::DuplicateShare => "Duplicate share",
            Self::LowDifficultyShare => "Low difficulty share",
            Self::Unauthorized => "Unauthorized worker",
            Self::NotSubscribed => "Not subscribed",
        })
    }
}

impl StratumError {
    pub fn into_response(self, traceback: Option<Value>) -> JsonRpcError {
        JsonRpcError {
            code: self as i32,
            message: self.to_string(),
            traceback,
        }
    }
}

/// The error member of a response: `[code, message, data?]` on the wire.
#[derive(Debug, Clone)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl PartialEq for JsonRpcError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Serialize for JsonRpcError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (code, message, traceback) =
            <(i32, String, Option<Value>)>::deserialize(deserializer)?;

        Ok(JsonRpcError {
            code,
            message,
            traceback,
        })
    }
}

impl Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Failures while parsing typed wire values.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InternalError {
    #[snafu(display("Failed to parse hex string: {source}"))]
    HexParse { source: hex::FromHexError },

    #[snafu(display("Invalid length: expected {expected}, got {actual}"))]
    InvalidLength { expected: usize, actual: usize },

    #[snafu(display("Invalid value: {reason}"))]
    InvalidValue { reason: String },

    #[snafu(display("Parse error: {message}"))]
    Parse { message: String },
}

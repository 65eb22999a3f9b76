use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("ABI error: {0}")]
    Abi(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Transaction failed: {0}")]
    WriteFailure(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No account found")]
    NoAccount,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for VoteError {
    fn from(e: serde_json::Error) -> Self {
        VoteError::InvalidJson(e.to_string())
    }
}

impl From<hex::FromHexError> for VoteError {
    fn from(e: hex::FromHexError) -> Self {
        VoteError::Abi(e.to_string())
    }
}

impl VoteError {
    /// Turns a failure of a state-mutating call into a `WriteFailure`.
    pub fn into_write_failure(self) -> Self {
        match self {
            VoteError::WriteFailure(_)
            | VoteError::InvalidAddress(_)
            | VoteError::InvalidInput(_)
            | VoteError::NoAccount => self,
            e => VoteError::WriteFailure(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;

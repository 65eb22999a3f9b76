use std::{env, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{errors::VoteError, Address};

pub const DEFAULT_RPC_URL: &str = "https://rpc.sepolia.org";
/// Blocks scanned backwards for `VoterApproved` events
pub const DEFAULT_LOG_LOOKBACK: u64 = 10_000;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 5;

/// Refresh rate of the admin election control
pub const ADMIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Refresh rate of the voter dashboard
pub const VOTER_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,
    pub contract_address: Address,
    pub account: Option<Address>,
    pub log_lookback: u64,
    pub rpc_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: Address::ZERO,
            account: None,
            log_lookback: DEFAULT_LOG_LOOKBACK,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Reads `SATYA_*` variables, after loading `.env` if there is one
    pub fn from_env() -> Result<Config, VoteError> {
        let _ = dotenv::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Config, VoteError> {
        let mut config = Config::default();
        if let Some(url) = var("SATYA_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(address) = var("SATYA_CONTRACT_ADDRESS") {
            config.contract_address = address
                .parse()
                .map_err(|_| VoteError::Config(format!("SATYA_CONTRACT_ADDRESS: {address}")))?;
        }
        if let Some(account) = var("SATYA_ACCOUNT") {
            let account = account
                .parse()
                .map_err(|_| VoteError::Config(format!("SATYA_ACCOUNT: {account}")))?;
            config.account = Some(account);
        }
        if let Some(lookback) = var("SATYA_LOG_LOOKBACK") {
            config.log_lookback = parse_u64("SATYA_LOG_LOOKBACK", &lookback)?;
        }
        if let Some(timeout) = var("SATYA_RPC_TIMEOUT_SECS") {
            config.rpc_timeout_secs = parse_u64("SATYA_RPC_TIMEOUT_SECS", &timeout)?;
        }
        if config.contract_address.is_zero() {
            log::warn!("No contract address configured, using the zero address");
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Config, VoteError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, VoteError> {
    value
        .trim()
        .parse()
        .map_err(|_| VoteError::Config(format!("{key}: {value}")))
}

pub mod abi;
mod address;
pub mod config;
pub mod contract;
pub mod election;
pub mod errors;
pub mod net;
pub mod poller;
pub mod results;
#[cfg(test)]
mod testing;
pub mod validate;
pub mod wallet;

pub use address::Address;
pub use config::{Config, ADMIN_POLL_INTERVAL, VOTER_POLL_INTERVAL};
pub use contract::ContractClient;
pub use election::{format_remaining, Candidate, ElectionStatus, Phase};
pub use errors::{Result, VoteError};
pub use poller::{
    Clock, Discard, ElectionPoller, ElectionSource, ElectionView, PollerHandle, RefreshOutcome,
    SystemClock,
};
pub use results::{ElectionResults, Rank, Standing};
pub use validate::validate_address;

use std::sync::Arc;

/// Poller over the configured contract, not yet started
pub fn election_poller(config: &Config) -> Result<ElectionPoller> {
    let client = ContractClient::new(config)?;
    Ok(ElectionPoller::new(Arc::new(client)))
}

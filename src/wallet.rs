use serde_json::json;

use crate::{errors::VoteError, net::RpcClient, Address};

/// Asks the wallet provider for its accounts and returns the first one.
/// Providers without `eth_requestAccounts` are asked with `eth_accounts`.
pub async fn request_account(rpc: &RpcClient) -> Result<Address, VoteError> {
    let requested = rpc
        .request::<Vec<Address>>("eth_requestAccounts", json!([]))
        .await;
    let accounts = match requested {
        Ok(accounts) => accounts,
        Err(VoteError::Rpc { code, message }) => {
            log::debug!("eth_requestAccounts unavailable ({code}: {message})");
            rpc.request("eth_accounts", json!([])).await?
        }
        Err(e) => return Err(e),
    };
    first_account(accounts)
}

fn first_account(accounts: Vec<Address>) -> Result<Address, VoteError> {
    accounts.into_iter().next().ok_or(VoteError::NoAccount)
}

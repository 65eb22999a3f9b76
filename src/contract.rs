use std::{collections::HashSet, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::{
    abi::{self, decode_hex, encode_call, encode_hex, AbiReader, Selector, Token},
    config::Config,
    election::{Candidate, ElectionStatus},
    errors::VoteError,
    net::{connect_rpc, to_quantity, RpcClient},
    poller::ElectionSource,
    validate::{check_candidate, check_duration},
    wallet::request_account,
    Address,
};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct LogEntry {
    data: String,
}

#[derive(Deserialize)]
struct Receipt {
    status: Option<String>,
}

/// Typed calls against the voting contract
#[derive(Clone)]
pub struct ContractClient {
    rpc: RpcClient,
    contract: Address,
    account: Option<Address>,
    log_lookback: u64,
}

impl ContractClient {
    pub fn new(config: &Config) -> Result<ContractClient, VoteError> {
        let rpc = connect_rpc(config)?;
        Ok(ContractClient {
            rpc,
            contract: config.contract_address,
            account: config.account,
            log_lookback: config.log_lookback,
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn call(&self, selector: Selector, args: &[Token]) -> Result<Vec<u8>, VoteError> {
        let mut tx = json!({
            "to": self.contract,
            "data": encode_hex(&encode_call(selector, args)),
        });
        if let Some(from) = self.account {
            tx["from"] = json!(from);
        }
        let result: String = self.rpc.request("eth_call", json!([tx, "latest"])).await?;
        decode_hex(&result)
    }

    async fn sender(&self) -> Result<Address, VoteError> {
        match self.account {
            Some(account) => Ok(account),
            None => request_account(&self.rpc).await,
        }
    }

    async fn transact(&self, selector: Selector, args: &[Token]) -> Result<String, VoteError> {
        let send = async {
            let from = self.sender().await?;
            let tx = json!({
                "from": from,
                "to": self.contract,
                "data": encode_hex(&encode_call(selector, args)),
            });
            let hash: String = self.rpc.request("eth_sendTransaction", json!([tx])).await?;
            Ok::<_, VoteError>(hash)
        };
        let hash = send.await.map_err(VoteError::into_write_failure)?;
        log::info!("Transaction hash: {hash}");
        Ok(hash)
    }

    pub async fn admin(&self) -> Result<Address, VoteError> {
        let data = self.call(abi::ADMIN, &[]).await?;
        AbiReader::new(&data).address(0)
    }

    pub async fn is_admin(&self, address: Address) -> Result<bool, VoteError> {
        Ok(self.admin().await? == address)
    }

    pub async fn approved_voter(&self, voter: Address) -> Result<bool, VoteError> {
        let data = self.call(abi::APPROVED_VOTERS, &[Token::Address(voter)]).await?;
        AbiReader::new(&data).bool(0)
    }

    pub async fn has_voted(&self, voter: Address) -> Result<bool, VoteError> {
        let data = self.call(abi::HAS_VOTED, &[Token::Address(voter)]).await?;
        AbiReader::new(&data).bool(0)
    }

    pub async fn candidate_count(&self) -> Result<u64, VoteError> {
        let data = self.call(abi::GET_CANDIDATE_COUNT, &[]).await?;
        AbiReader::new(&data).uint(0)
    }

    pub async fn candidate(&self, id: u64) -> Result<Candidate, VoteError> {
        let data = self.call(abi::GET_CANDIDATE, &[Token::Uint(id)]).await?;
        Candidate::from_abi(id, &data)
    }

    pub async fn candidates(&self) -> Result<Vec<Candidate>, VoteError> {
        let count = self.candidate_count().await?;
        let mut candidates = vec![];
        for id in 1..=count {
            candidates.push(self.candidate(id).await?);
        }
        log::debug!("Fetched {} candidates", candidates.len());
        Ok(candidates)
    }

    pub async fn election_status(&self) -> Result<ElectionStatus, VoteError> {
        let data = self.call(abi::GET_ELECTION_STATUS, &[]).await?;
        ElectionStatus::from_abi(&data)
    }

    /// Voters approved within the last `log_lookback` blocks that are still approved
    pub async fn voters(&self) -> Result<Vec<Address>, VoteError> {
        let latest = self.rpc.block_number().await?;
        let from_block = latest.saturating_sub(self.log_lookback);
        log::debug!("Fetching voter logs from block {from_block} to {latest}");
        let logs: Vec<LogEntry> = self
            .rpc
            .request(
                "eth_getLogs",
                json!([{
                    "address": self.contract,
                    "topics": [abi::VOTER_APPROVED_TOPIC],
                    "fromBlock": to_quantity(from_block),
                    "toBlock": to_quantity(latest),
                }]),
            )
            .await?;
        let mut addresses = vec![];
        for entry in logs.iter() {
            let data = decode_hex(&entry.data)?;
            addresses.push(AbiReader::new(&data).address(0)?);
        }
        let candidates = unique(addresses);

        let checks = candidates.iter().map(|voter| self.approved_voter(*voter));
        let results = futures::future::join_all(checks).await;
        let mut voters = vec![];
        for (voter, approved) in candidates.into_iter().zip(results) {
            match approved {
                Ok(true) => voters.push(voter),
                Ok(false) => {}
                Err(e) => log::warn!("Error checking voter {voter} status: {e}"),
            }
        }
        Ok(voters)
    }

    pub async fn approve_voter(&self, voter: &str) -> Result<String, VoteError> {
        let voter: Address = voter.parse()?;
        log::info!("Approving voter {voter}");
        self.transact(abi::APPROVE_VOTER, &[Token::Address(voter)]).await
    }

    pub async fn add_candidate(
        &self,
        name: &str,
        party: &str,
        tagline: &str,
        logo_ipfs: &str,
    ) -> Result<String, VoteError> {
        check_candidate(name)?;
        self.transact(
            abi::ADD_CANDIDATE,
            &[
                Token::String(name.to_string()),
                Token::String(party.to_string()),
                Token::String(tagline.to_string()),
                Token::String(logo_ipfs.to_string()),
            ],
        )
        .await
    }

    pub async fn remove_candidate(&self, id: u64) -> Result<String, VoteError> {
        self.transact(abi::REMOVE_CANDIDATE, &[Token::Uint(id)]).await
    }

    pub async fn start_election(&self, duration_minutes: u64) -> Result<String, VoteError> {
        check_duration(duration_minutes)?;
        self.transact(abi::START_ELECTION, &[Token::Uint(duration_minutes)]).await
    }

    pub async fn cast_vote(&self, candidate_id: u64) -> Result<String, VoteError> {
        self.transact(abi::VOTE, &[Token::Uint(candidate_id)]).await
    }

    /// Polls for the receipt of `hash`; a reverted transaction is a `WriteFailure`
    pub async fn wait_for_receipt(&self, hash: &str, timeout: Duration) -> Result<(), VoteError> {
        let deadline = Instant::now() + timeout;
        loop {
            let receipt: Value = self
                .rpc
                .request_raw("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if !receipt.is_null() {
                let receipt: Receipt = serde_json::from_value(receipt)?;
                return check_receipt(hash, &receipt);
            }
            if Instant::now() >= deadline {
                return Err(VoteError::WriteFailure(format!("No receipt for {hash}")));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

impl ElectionSource for ContractClient {
    fn election_status(&self) -> BoxFuture<'static, Result<ElectionStatus, VoteError>> {
        let client = self.clone();
        async move { ContractClient::election_status(&client).await }.boxed()
    }
}

fn check_receipt(hash: &str, receipt: &Receipt) -> Result<(), VoteError> {
    match receipt.status.as_deref() {
        Some("0x0") => Err(VoteError::WriteFailure(format!("Transaction {hash} reverted"))),
        _ => Ok(()),
    }
}

/// Drops repeated addresses, keeping first occurrences in order
fn unique(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = HashSet::new();
    addresses.into_iter().filter(|a| seen.insert(*a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        poller::{ElectionPoller, RefreshOutcome},
        testing::{not_found, returns, MockNode},
    };

    /// Dispatches `eth_call` on the selector of its calldata
    fn contract_calls(params: &Value) -> Result<Value, (i64, String)> {
        let data = params[0]["data"].as_str().unwrap_or_default();
        match &data[..10] {
            "0x122902a6" => Ok(returns(&[
                Token::Bool(true),
                Token::Uint(1000),
                Token::Uint(1060),
                Token::Uint(5),
            ])),
            "0x30a56347" => Ok(returns(&[Token::Uint(2)])),
            "0x35b8e820" => {
                let id = AbiReader::new(&decode_hex(&data[10..]).unwrap()).uint(0).unwrap();
                Ok(returns(&[
                    Token::String(format!("Candidate {id}")),
                    Token::String("Party".into()),
                    Token::String("Tagline".into()),
                    Token::String("QmLogo".into()),
                    Token::Uint(id * 10),
                ]))
            }
            _ => Err((3, "execution reverted".into())),
        }
    }

    #[tokio::test]
    async fn reads_election_status() {
        let node = MockNode::start(|method, params| match method {
            "eth_call" => contract_calls(params),
            m => Err(not_found(m)),
        })
        .await;
        let client = ContractClient::new(&node.config()).unwrap();

        let status = client.election_status().await.unwrap();
        assert_eq!(
            status,
            ElectionStatus {
                is_active: true,
                start_time: 1000,
                end_time: 1060,
                total_votes: 5,
            }
        );

        let (method, params) = node.calls().remove(0);
        assert_eq!(method, "eth_call");
        assert_eq!(params[0]["to"], "0x00000000000000000000000000000000000000cc");
        assert_eq!(params[0]["data"], "0x122902a6");
        assert!(params[0].get("from").is_none());
        assert_eq!(params[1], "latest");
    }

    #[tokio::test]
    async fn reads_candidates_in_id_order() {
        let node = MockNode::start(|method, params| match method {
            "eth_call" => contract_calls(params),
            m => Err(not_found(m)),
        })
        .await;
        let client = ContractClient::new(&node.config()).unwrap();

        let candidates = client.candidates().await.unwrap();
        let summary: Vec<(u64, &str, u64)> = candidates
            .iter()
            .map(|c| (c.id, c.name.as_str(), c.vote_count))
            .collect();
        assert_eq!(summary, vec![(1, "Candidate 1", 10), (2, "Candidate 2", 20)]);
        assert_eq!(candidates[0].logo_ipfs, "QmLogo");
        assert_eq!(node.calls().len(), 3);
    }

    #[tokio::test]
    async fn polls_through_contract() {
        let node = MockNode::start(|method, params| match method {
            "eth_call" => contract_calls(params),
            m => Err(not_found(m)),
        })
        .await;
        let client = ContractClient::new(&node.config()).unwrap();
        let poller = ElectionPoller::new(std::sync::Arc::new(client));

        match poller.refresh().await {
            RefreshOutcome::Applied(view) => {
                assert_eq!(view.election.unwrap().end_time, 1060);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_vote_is_a_write_failure() {
        let node = MockNode::start(|method, _| match method {
            "eth_sendTransaction" => Err((3, "execution reverted: Already voted".into())),
            m => Err(not_found(m)),
        })
        .await;
        let config = Config {
            account: Some(address(0xaa)),
            ..node.config()
        };
        let client = ContractClient::new(&config).unwrap();

        match client.cast_vote(2).await {
            Err(VoteError::WriteFailure(message)) => assert!(message.contains("Already voted")),
            other => panic!("unexpected result {other:?}"),
        }
        let (method, params) = node.calls().remove(0);
        assert_eq!(method, "eth_sendTransaction");
        assert_eq!(params[0]["from"], "0x00000000000000000000000000000000000000aa");
        assert_eq!(params[0]["to"], "0x00000000000000000000000000000000000000cc");
        assert_eq!(
            params[0]["data"],
            "0x0121b93f0000000000000000000000000000000000000000000000000000000000000002"
        );
    }

    #[tokio::test]
    async fn sender_comes_from_wallet_when_not_configured() {
        let node = MockNode::start(|method, _| match method {
            "eth_requestAccounts" => Ok(json!(["0x00000000000000000000000000000000000000bb"])),
            "eth_sendTransaction" => Ok(json!("0xfeed")),
            m => Err(not_found(m)),
        })
        .await;
        let client = ContractClient::new(&node.config()).unwrap();

        assert_eq!(client.start_election(60).await.unwrap(), "0xfeed");
        assert_eq!(node.methods(), vec!["eth_requestAccounts", "eth_sendTransaction"]);
        let (_, params) = node.calls().remove(1);
        assert_eq!(params[0]["from"], "0x00000000000000000000000000000000000000bb");
    }

    fn address(last: u8) -> Address {
        let mut a = [0u8; 20];
        a[19] = last;
        Address(a)
    }

    #[test]
    fn unique_keeps_order() {
        let voters = unique(vec![address(2), address(1), address(2), address(3), address(1)]);
        assert_eq!(voters, vec![address(2), address(1), address(3)]);
    }

    #[test]
    fn reverted_receipt() {
        let ok: Receipt = serde_json::from_str(r#"{"status":"0x1"}"#).unwrap();
        assert!(check_receipt("0xab", &ok).is_ok());
        let reverted: Receipt = serde_json::from_str(r#"{"status":"0x0"}"#).unwrap();
        assert!(matches!(
            check_receipt("0xab", &reverted),
            Err(VoteError::WriteFailure(_))
        ));
        // pre-byzantium receipts carry no status
        let legacy: Receipt = serde_json::from_str(r#"{"root":"0x00"}"#).unwrap();
        assert!(check_receipt("0xab", &legacy).is_ok());
    }

    #[test]
    fn write_failures_are_classified() {
        let e = VoteError::Rpc {
            code: 3,
            message: "execution reverted: Not admin".into(),
        };
        assert!(matches!(
            e.into_write_failure(),
            VoteError::WriteFailure(m) if m.contains("Not admin")
        ));
        assert!(matches!(VoteError::NoAccount.into_write_failure(), VoteError::NoAccount));
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected_before_sending() {
        let config = Config {
            // nothing listens here; validation must fail first
            rpc_url: "http://127.0.0.1:9".into(),
            ..Config::default()
        };
        let client = ContractClient::new(&config).unwrap();
        assert!(matches!(
            client.approve_voter("0x12").await,
            Err(VoteError::InvalidAddress(_))
        ));
        assert!(matches!(
            client.add_candidate("", "Green", "", "").await,
            Err(VoteError::InvalidInput(_))
        ));
        assert!(matches!(
            client.start_election(0).await,
            Err(VoteError::InvalidInput(_))
        ));
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{abi::AbiReader, errors::VoteError};

/// Election state as reported by the contract's `getElectionStatus()`
#[derive(Clone, Copy, Serialize, Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatus {
    pub is_active: bool,
    pub start_time: u64,
    /// 0 when no election was ever started
    pub end_time: u64,
    pub total_votes: u64,
}

impl ElectionStatus {
    pub fn from_abi(data: &[u8]) -> Result<ElectionStatus, VoteError> {
        let r = AbiReader::new(data);
        Ok(ElectionStatus {
            is_active: r.bool(0)?,
            start_time: r.uint(1)?,
            end_time: r.uint(2)?,
            total_votes: r.uint(3)?,
        })
    }

    /// Classifies the election at wall-clock time `now` (unix seconds).
    /// A passed deadline reads as `Ended` even when the contract still
    /// reports the election as active.
    pub fn phase(&self, now: u64) -> Phase {
        if !self.is_active {
            Phase::Inactive
        } else if self.end_time > 0 && now >= self.end_time {
            Phase::Ended
        } else {
            Phase::Active
        }
    }

    /// Time left before the deadline, only while `Active` with a deadline
    pub fn remaining(&self, now: u64) -> Option<Duration> {
        match self.phase(now) {
            Phase::Active if self.end_time > 0 => {
                Some(Duration::from_secs(self.end_time.saturating_sub(now)))
            }
            _ => None,
        }
    }
}

/// Candidate as returned by `getCandidate(id)`, ids start at 1
#[derive(Clone, Serialize, Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    pub party: String,
    pub tagline: String,
    #[serde(rename = "logoIPFS")]
    pub logo_ipfs: String,
    pub vote_count: u64,
}

impl Candidate {
    pub fn from_abi(id: u64, data: &[u8]) -> Result<Candidate, VoteError> {
        let r = AbiReader::new(data);
        Ok(Candidate {
            id,
            name: r.string(0)?,
            party: r.string(1)?,
            tagline: r.string(2)?,
            logo_ipfs: r.string(3)?,
            vote_count: r.uint(4)?,
        })
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inactive,
    Active,
    Ended,
}

/// Renders a duration as `1h 2m 5s`, leading zero units omitted
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

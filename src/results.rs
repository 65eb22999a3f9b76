use serde::Serialize;

use crate::election::Candidate;

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
pub enum Rank {
    Gold,
    Silver,
    Bronze,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Standing {
    pub candidate: Candidate,
    /// Share of all votes, one decimal
    pub percentage: f64,
    pub rank: Option<Rank>,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ElectionResults {
    pub standings: Vec<Standing>,
    pub total_votes: u64,
    pub has_winner: bool,
    pub is_tie: bool,
}

impl ElectionResults {
    pub fn new(candidates: &[Candidate], total_votes: u64) -> Self {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

        let top = sorted.first().map(|c| c.vote_count);
        let second = sorted.get(1).map(|c| c.vote_count);
        let has_winner = match (top, second) {
            (Some(t), None) => t > 0,
            (Some(t), Some(s)) => t > 0 && t > s,
            _ => false,
        };
        let is_tie = matches!((top, second), (Some(t), Some(s)) if t == s);

        let standings = sorted
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let rank = if candidate.vote_count == 0 {
                    None
                } else {
                    match i {
                        0 if has_winner => Some(Rank::Gold),
                        1 if !is_tie => Some(Rank::Silver),
                        2 if !is_tie => Some(Rank::Bronze),
                        _ => None,
                    }
                };
                Standing {
                    percentage: percentage(candidate.vote_count, total_votes),
                    candidate,
                    rank,
                }
            })
            .collect();

        ElectionResults {
            standings,
            total_votes,
            has_winner,
            is_tie,
        }
    }

    pub fn winner(&self) -> Option<&Candidate> {
        if self.has_winner {
            self.standings.first().map(|s| &s.candidate)
        } else {
            None
        }
    }
}

fn percentage(votes: u64, total_votes: u64) -> f64 {
    if total_votes == 0 {
        return 0.0;
    }
    (votes as f64 / total_votes as f64 * 1000.0).round() / 10.0
}

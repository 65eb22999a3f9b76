use std::io::Write;

use crate::{errors::VoteError, Address};

pub type Selector = [u8; 4];
pub const WORD: usize = 32;

// keccak256 of the function signature, first 4 bytes
pub const ADMIN: Selector = [0xf8, 0x51, 0xa4, 0x40]; // admin()
pub const APPROVE_VOTER: Selector = [0x11, 0x9d, 0x4d, 0xdb]; // approveVoter(address)
pub const APPROVED_VOTERS: Selector = [0xdf, 0xf5, 0xb8, 0x3e]; // approvedVoters(address)
// addCandidate(string,string,string,string)
pub const ADD_CANDIDATE: Selector = [0x42, 0xb0, 0x3c, 0xc9];
pub const REMOVE_CANDIDATE: Selector = [0x09, 0xe9, 0xd7, 0xe2]; // removeCandidate(uint256)
pub const GET_CANDIDATE_COUNT: Selector = [0x30, 0xa5, 0x63, 0x47]; // getCandidateCount()
pub const GET_CANDIDATE: Selector = [0x35, 0xb8, 0xe8, 0x20]; // getCandidate(uint256)
pub const START_ELECTION: Selector = [0x6d, 0x32, 0xdc, 0x4b]; // startElection(uint256)
pub const GET_ELECTION_STATUS: Selector = [0x12, 0x29, 0x02, 0xa6]; // getElectionStatus()
pub const VOTE: Selector = [0x01, 0x21, 0xb9, 0x3f]; // vote(uint256)
pub const HAS_VOTED: Selector = [0x09, 0xee, 0xf4, 0x3e]; // hasVoted(address)

/// Topic of `VoterApproved(address)`
pub const VOTER_APPROVED_TOPIC: &str =
    "0x85e209912e11195144f49695f608785c8a31876f9d5d831813c396126a21b484";

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Uint(u64),
    Address(Address),
    Bool(bool),
    String(String),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_))
    }

    fn write_static<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        let mut word = [0u8; WORD];
        match self {
            Token::Uint(v) => word[24..].copy_from_slice(&v.to_be_bytes()),
            Token::Address(a) => word[12..].copy_from_slice(&a.0),
            Token::Bool(b) => word[31] = *b as u8,
            Token::String(_) => unreachable!("dynamic token"),
        }
        w.write_all(&word)
    }
}

fn padded_len(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

fn uint_word(v: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&v.to_be_bytes());
    word
}

/// Head/tail encoding of `tokens`, prefixed with the selector
pub fn encode_call(selector: Selector, tokens: &[Token]) -> Vec<u8> {
    let mut head: Vec<u8> = vec![];
    let mut tail: Vec<u8> = vec![];
    let head_size = tokens.len() * WORD;
    for t in tokens.iter() {
        if t.is_dynamic() {
            let offset = (head_size + tail.len()) as u64;
            head.extend_from_slice(&uint_word(offset));
            if let Token::String(s) = t {
                let bytes = s.as_bytes();
                tail.extend_from_slice(&uint_word(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                tail.resize(tail.len() + padded_len(bytes.len()) - bytes.len(), 0);
            }
        } else {
            // writing into a Vec cannot fail
            let _ = t.write_static(&mut head);
        }
    }
    let mut data = Vec::with_capacity(4 + head.len() + tail.len());
    data.extend_from_slice(&selector);
    data.extend_from_slice(&head);
    data.extend_from_slice(&tail);
    data
}

pub fn encode_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, VoteError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(digits)?)
}

/// Reads the words of an ABI encoded return value
pub struct AbiReader<'a> {
    data: &'a [u8],
}

impl<'a> AbiReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        AbiReader { data }
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8], VoteError> {
        offset
            .checked_add(WORD)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                VoteError::Abi(format!("Return data too short ({} bytes)", self.data.len()))
            })
    }

    fn u64_at(&self, offset: usize) -> Result<u64, VoteError> {
        let word = self.word_at(offset)?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(VoteError::Abi("uint256 does not fit in 64 bits".into()));
        }
        let mut v = [0u8; 8];
        v.copy_from_slice(&word[24..]);
        Ok(u64::from_be_bytes(v))
    }

    pub fn uint(&self, index: usize) -> Result<u64, VoteError> {
        self.u64_at(word_offset(index)?)
    }

    pub fn bool(&self, index: usize) -> Result<bool, VoteError> {
        Ok(self.uint(index)? != 0)
    }

    pub fn address(&self, index: usize) -> Result<Address, VoteError> {
        let word = self.word_at(word_offset(index)?)?;
        let mut a = [0u8; 20];
        a.copy_from_slice(&word[12..]);
        Ok(Address(a))
    }

    pub fn string(&self, index: usize) -> Result<String, VoteError> {
        let offset = to_usize(self.uint(index)?)?;
        let len = to_usize(self.u64_at(offset)?)?;
        let bytes = offset
            .checked_add(WORD)
            .and_then(|start| Some(start..start.checked_add(len)?))
            .and_then(|range| self.data.get(range))
            .ok_or_else(|| VoteError::Abi("String out of bounds".into()))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| VoteError::Abi(e.to_string()))
    }
}

fn word_offset(index: usize) -> Result<usize, VoteError> {
    index
        .checked_mul(WORD)
        .ok_or_else(|| VoteError::Abi(format!("Word index {index} out of range")))
}

fn to_usize(v: u64) -> Result<usize, VoteError> {
    usize::try_from(v).map_err(|_| VoteError::Abi(format!("Offset {v} out of range")))
}

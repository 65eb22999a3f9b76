use crate::{errors::VoteError, Address};

pub fn validate_address(address: &str) -> bool {
    address.parse::<Address>().is_ok()
}

pub fn check_candidate(name: &str) -> Result<(), VoteError> {
    if name.trim().is_empty() {
        return Err(VoteError::InvalidInput("Candidate name is required".into()));
    }
    Ok(())
}

pub fn check_duration(duration_minutes: u64) -> Result<(), VoteError> {
    if duration_minutes == 0 {
        return Err(VoteError::InvalidInput("Election duration must be positive".into()));
    }
    Ok(())
}

use serde::{Deserialize, Serialize};

use crate::models::domain::{BloodType, MatchResult};
use crate::models::requests::MatchMode;

/// Status of the best match found for a recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    MatchFound,
    PotentialMatch,
    Waiting,
}

impl AllocationStatus {
    /// Above 0.8 is a match, above 0.5 a potential match
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            AllocationStatus::MatchFound
        } else if score > 0.5 {
            AllocationStatus::PotentialMatch
        } else {
            AllocationStatus::Waiting
        }
    }
}

/// Non-identifying view of the recipient a response is for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientSummary {
    pub id: String,
    pub blood_type: BloodType,
    pub urgency: Option<u8>,
}

/// Response for a match computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub request_id: String,
    pub mode: MatchMode,
    pub recipient: RecipientSummary,
    pub matches: Vec<MatchResult>,
    pub total_candidates: usize,
}

/// Record handed to the match sink after a computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub request_id: String,
    pub recipient_id: String,
    pub organ: Option<String>,
    pub urgency_score: Option<u8>,
    pub best_match_donor_id: Option<String>,
    pub match_score: f64,
    pub status: AllocationStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Best available donor for one of the most urgent recipients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub recipient_id: String,
    pub organ: Option<String>,
    pub urgency_score: Option<u8>,
    pub best_match_donor_id: Option<String>,
    pub match_score: f64,
    pub status: AllocationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(AllocationStatus::from_score(0.95), AllocationStatus::MatchFound);
        assert_eq!(AllocationStatus::from_score(0.8), AllocationStatus::PotentialMatch);
        assert_eq!(AllocationStatus::from_score(0.51), AllocationStatus::PotentialMatch);
        assert_eq!(AllocationStatus::from_score(0.5), AllocationStatus::Waiting);
        assert_eq!(AllocationStatus::from_score(0.0), AllocationStatus::Waiting);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AllocationStatus::PotentialMatch).unwrap();
        assert_eq!(json, "\"potential_match\"");
    }
}

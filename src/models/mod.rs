// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{BloodType, Donor, HlaMatch, MatchResult, Profile, Recipient, Role, ScoreBreakdown, UnknownBloodType};
pub use requests::{MatchMode, MatchRequest};
pub use responses::{Allocation, AllocationStatus, MatchResponse, MatchSummary, RecipientSummary};

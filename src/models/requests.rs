use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// How candidates are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// All donors ranked centrally by exact score, top 10
    #[default]
    Single,
    /// Per-site top 5, merged into a global top-k by noisy score
    Federated,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Single => f.write_str("single"),
            MatchMode::Federated => f.write_str("federated"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(MatchMode::Single),
            "federated" | "global" => Ok(MatchMode::Federated),
            other => Err(format!("unknown match mode: {}", other)),
        }
    }
}

/// Request to compute matches for one recipient
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchRequest {
    #[validate(length(min = 1))]
    pub recipient_id: String,
    #[serde(default)]
    pub mode: MatchMode,
}

impl MatchRequest {
    pub fn new(recipient_id: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            mode,
        }
    }
}

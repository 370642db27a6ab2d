use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::core::compatibility::{parse_hla, HLA_MAX};

/// The eight canonical ABO/Rh blood groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BloodType {
    ONeg,
    OPos,
    ANeg,
    APos,
    BNeg,
    BPos,
    AbNeg,
    AbPos,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::ONeg,
        BloodType::OPos,
        BloodType::ANeg,
        BloodType::APos,
        BloodType::BNeg,
        BloodType::BPos,
        BloodType::AbNeg,
        BloodType::AbPos,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BloodType::ONeg => "O-",
            BloodType::OPos => "O+",
            BloodType::ANeg => "A-",
            BloodType::APos => "A+",
            BloodType::BNeg => "B-",
            BloodType::BPos => "B+",
            BloodType::AbNeg => "AB-",
            BloodType::AbPos => "AB+",
        }
    }

    /// O- or O+
    pub fn is_group_o(self) -> bool {
        matches!(self, BloodType::ONeg | BloodType::OPos)
    }

    /// AB- or AB+
    pub fn is_group_ab(self) -> bool {
        matches!(self, BloodType::AbNeg | BloodType::AbPos)
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the eight blood groups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown blood type: {0:?}")]
pub struct UnknownBloodType(pub String);

impl FromStr for BloodType {
    type Err = UnknownBloodType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == normalized)
            .ok_or_else(|| UnknownBloodType(s.to_string()))
    }
}

impl TryFrom<String> for BloodType {
    type Error = UnknownBloodType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BloodType> for String {
    fn from(value: BloodType) -> Self {
        value.as_str().to_string()
    }
}

/// HLA match potential, the numerator of an "X/Y" marker string (0-6)
///
/// Decoding never fails: anything that does not parse becomes 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct HlaMatch(u8);

impl HlaMatch {
    pub fn new(value: u8) -> Self {
        if value > HLA_MAX {
            Self(0)
        } else {
            Self(value)
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self(parse_hla(Some(raw)))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Fraction of the maximum match potential, in [0, 1]
    pub fn fraction(self) -> f64 {
        self.0 as f64 / HLA_MAX as f64
    }
}

impl Serialize for HlaMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}/{}", self.0, HLA_MAX))
    }
}

impl<'de> Deserialize<'de> for HlaMatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(s)) => HlaMatch::parse(&s),
            _ => HlaMatch::default(),
        })
    }
}

/// Profile ids arrive as either JSON numbers or strings
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid profile id: {}", other))),
    }
}

/// Which side of a pairing a profile is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Recipient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Donor => f.write_str("donor"),
            Role::Recipient => f.write_str("recipient"),
        }
    }
}

/// Organ donor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub blood_type: BloodType,
    pub age: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub hla_markers: HlaMatch,
    #[serde(default, alias = "organs_available")]
    pub organs: Vec<String>,
    #[serde(default)]
    pub comorbidities: Option<String>,
}

impl Donor {
    /// Absent, blank and "None" all mean no recorded comorbidity
    pub fn has_comorbidity(&self) -> bool {
        match self.comorbidities.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(c) => !c.eq_ignore_ascii_case("none"),
        }
    }
}

/// Organ recipient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub blood_type: BloodType,
    pub age: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub hla_markers: HlaMatch,
    #[serde(default)]
    pub urgency_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organ_required: Option<String>,
    #[serde(default)]
    pub comorbidities: Option<String>,
}

impl Recipient {
    /// Urgency as used for ranking and prediction; absent counts as 0
    pub fn urgency_or_zero(&self) -> u8 {
        self.urgency_score.unwrap_or(0)
    }
}

/// A donor or recipient record, tagged by `role`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Donor(Donor),
    Recipient(Recipient),
}

impl Profile {
    pub fn id(&self) -> &str {
        match self {
            Profile::Donor(d) => &d.id,
            Profile::Recipient(r) => &r.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Profile::Donor(_) => Role::Donor,
            Profile::Recipient(_) => Role::Recipient,
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            Profile::Donor(d) => d.age,
            Profile::Recipient(r) => r.age,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Profile::Donor(d) => &d.location,
            Profile::Recipient(r) => &r.location,
        }
    }

    pub fn blood_type(&self) -> BloodType {
        match self {
            Profile::Donor(d) => d.blood_type,
            Profile::Recipient(r) => r.blood_type,
        }
    }

    pub fn as_donor(&self) -> Option<&Donor> {
        match self {
            Profile::Donor(d) => Some(d),
            Profile::Recipient(_) => None,
        }
    }

    pub fn as_recipient(&self) -> Option<&Recipient> {
        match self {
            Profile::Recipient(r) => Some(r),
            Profile::Donor(_) => None,
        }
    }
}

/// Per-component compatibility, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub blood: f64,
    pub hla: f64,
    pub proximity: f64,
    pub urgency: f64,
}

/// Ranked, privacy-calibrated match for one donor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub donor_id: String,
    pub blood_type: BloodType,
    pub location: String,
    pub organs: Vec<String>,
    pub raw_score: f64,
    pub noisy_score: f64,
    pub distance_km: f64,
    pub success_probability: f64,
    pub breakdown: ScoreBreakdown,
    pub match_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_note: Option<String>,
}

impl MatchResult {
    /// Noisy score as a percentage, one decimal
    pub fn display_score(&self) -> f64 {
        (self.noisy_score * 1000.0).round() / 10.0
    }

    /// Success probability as a percentage, one decimal
    pub fn display_probability(&self) -> f64 {
        (self.success_probability * 1000.0).round() / 10.0
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Pothole,
    Drainage,
    WaterSupply,
    Garbage,
    StreetLight,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Pothole => "pothole",
            IssueType::Drainage => "drainage",
            IssueType::WaterSupply => "water_supply",
            IssueType::Garbage => "garbage",
            IssueType::StreetLight => "street_light",
        }
    }

    /// Human readable label used in spoken prompts.
    pub fn label(&self) -> &'static str {
        match self {
            IssueType::Pothole => "pothole or road damage",
            IssueType::Drainage => "drainage or sewage",
            IssueType::WaterSupply => "water supply",
            IssueType::Garbage => "garbage collection",
            IssueType::StreetLight => "street light",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::High => f.write_str("high"),
            Urgency::Medium => f.write_str("medium"),
        }
    }
}

/// Position in the four-step intake conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cursor {
    #[default]
    AwaitingIssueType,
    AwaitingLocation,
    AwaitingDescription,
    AwaitingConfirmation,
}

impl Cursor {
    pub fn index(&self) -> u8 {
        match self {
            Cursor::AwaitingIssueType => 0,
            Cursor::AwaitingLocation => 1,
            Cursor::AwaitingDescription => 2,
            Cursor::AwaitingConfirmation => 3,
        }
    }
}

/// The complaint being assembled across turns. Fields fill strictly in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintDraft {
    pub issue_type: Option<IssueType>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub urgency: Option<Urgency>,
}

impl ComplaintDraft {
    pub fn is_empty(&self) -> bool {
        self.issue_type.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.urgency.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.issue_type.is_some()
            && self.location.is_some()
            && self.description.is_some()
            && self.urgency.is_some()
    }

    /// Turns a complete draft into a submission record. Returns `None` while
    /// any field is still missing.
    pub fn finalize(&self, case_id: String) -> Option<FinalizedComplaint> {
        Some(FinalizedComplaint {
            issue_type: self.issue_type?,
            location: self.location.clone()?,
            description: self.description.clone()?,
            urgency: self.urgency?,
            case_id,
            submitted_at: SystemTime::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedComplaint {
    pub issue_type: IssueType,
    pub location: String,
    pub description: String,
    pub urgency: Urgency,
    pub case_id: String,
    pub submitted_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: SystemTime,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            timestamp: SystemTime::now(),
        }
    }
}

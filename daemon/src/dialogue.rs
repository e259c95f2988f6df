//! Four-step complaint intake: issue type, location, description, confirmation.

use log::{debug, info};
use shared::{ComplaintDraft, Cursor, FinalizedComplaint, IssueType};
use uuid::Uuid;

use crate::keywords::{classify_issue, derive_urgency, is_affirmative};

/// What a turn did to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Advanced,
    Reprompted,
    Submitted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub reply: String,
    pub outcome: TurnOutcome,
    pub submitted: Option<FinalizedComplaint>,
}

impl Turn {
    fn reply(reply: String, outcome: TurnOutcome) -> Self {
        Self {
            reply,
            outcome,
            submitted: None,
        }
    }
}

pub fn category_menu() -> String {
    let labels: Vec<&str> = [
        IssueType::Pothole,
        IssueType::Drainage,
        IssueType::WaterSupply,
        IssueType::Garbage,
        IssueType::StreetLight,
    ]
    .iter()
    .map(IssueType::label)
    .collect();
    format!(
        "What would you like to report? You can say {}, or {}.",
        labels[..labels.len() - 1].join(", "),
        labels[labels.len() - 1]
    )
}

pub fn greeting() -> String {
    format!("Namaste! Welcome to Municipal Services. {}", category_menu())
}

fn summary(draft: &ComplaintDraft) -> String {
    format!(
        "Here is your complaint. Issue: {}. Location: {}. Details: {}. Urgency: {}. Shall I submit it? Please say yes or no.",
        draft.issue_type.map(|issue| issue.label()).unwrap_or("unknown"),
        draft.location.as_deref().unwrap_or(""),
        draft.description.as_deref().unwrap_or(""),
        draft.urgency.map(|urgency| urgency.to_string()).unwrap_or_default(),
    )
}

/// Generates case identifiers. Identifiers are unique per generator through
/// the sequence number and across processes through the random suffix.
#[derive(Debug, Default)]
pub struct CaseIdGenerator {
    sequence: u32,
}

impl CaseIdGenerator {
    pub fn next_id(&mut self) -> String {
        self.sequence += 1;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("VC-{:04}-{}", self.sequence, suffix[..6].to_uppercase())
    }
}

/// Owns the conversation cursor and the draft. Every call to
/// [`DialogueEngine::advance`] is one complete turn.
#[derive(Debug, Default)]
pub struct DialogueEngine {
    cursor: Cursor,
    draft: ComplaintDraft,
    case_ids: CaseIdGenerator,
}

impl DialogueEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn draft(&self) -> &ComplaintDraft {
        &self.draft
    }

    /// Discards the draft and returns to the first question.
    pub fn restart(&mut self) -> String {
        self.reset();
        greeting()
    }

    pub fn advance(&mut self, utterance: &str) -> Turn {
        debug!("Turn at {:?}: {}", self.cursor, utterance);

        match self.cursor {
            Cursor::AwaitingIssueType => match classify_issue(utterance) {
                Some(issue) => {
                    self.draft.issue_type = Some(issue);
                    self.cursor = Cursor::AwaitingLocation;
                    Turn::reply(
                        format!(
                            "Got it, a {} complaint. Where is the problem? Please tell me the street, area or a nearby landmark.",
                            issue.label()
                        ),
                        TurnOutcome::Advanced,
                    )
                }
                None => Turn::reply(
                    format!("Sorry, I did not catch the type of issue. {}", category_menu()),
                    TurnOutcome::Reprompted,
                ),
            },
            Cursor::AwaitingLocation => {
                self.draft.location = Some(utterance.to_string());
                self.cursor = Cursor::AwaitingDescription;
                Turn::reply(
                    "Thank you. Please describe the problem in a few words.".to_string(),
                    TurnOutcome::Advanced,
                )
            }
            Cursor::AwaitingDescription => {
                self.draft.description = Some(utterance.to_string());
                self.draft.urgency = Some(derive_urgency(utterance));
                self.cursor = Cursor::AwaitingConfirmation;
                Turn::reply(summary(&self.draft), TurnOutcome::Advanced)
            }
            Cursor::AwaitingConfirmation => {
                if !is_affirmative(utterance) {
                    info!("Complaint cancelled at confirmation");
                    self.reset();
                    return Turn::reply(
                        "Okay, I have cancelled this complaint. You can start a new one any time."
                            .to_string(),
                        TurnOutcome::Cancelled,
                    );
                }

                let case_id = self.case_ids.next_id();
                let submitted = self.draft.finalize(case_id.clone());
                self.reset();
                match submitted {
                    Some(complaint) => {
                        info!("Complaint {} finalized ({})", complaint.case_id, complaint.issue_type);
                        Turn {
                            reply: format!(
                                "Your complaint has been registered. Your case ID is {}. {} urgency cases are reviewed by the ward office.",
                                complaint.case_id,
                                capitalize(&complaint.urgency.to_string())
                            ),
                            outcome: TurnOutcome::Submitted,
                            submitted: Some(complaint),
                        }
                    }
                    // unreachable while fields fill in order, but never lose the turn
                    None => Turn::reply(
                        format!("Sorry, that complaint was incomplete. {}", category_menu()),
                        TurnOutcome::Cancelled,
                    ),
                }
            }
        }
    }

    fn reset(&mut self) {
        self.cursor = Cursor::AwaitingIssueType;
        self.draft = ComplaintDraft::default();
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Urgency;

    fn fill_three_turns(engine: &mut DialogueEngine) {
        engine.advance("there is a pothole");
        engine.advance("Main Road near the market");
        engine.advance("it is very severe and dangerous");
    }

    #[test]
    fn pothole_intake_submits_on_yes() {
        let mut engine = DialogueEngine::new();

        let turn = engine.advance("there is a pothole");
        assert_eq!(turn.outcome, TurnOutcome::Advanced);
        assert_eq!(engine.draft().issue_type, Some(IssueType::Pothole));
        assert_eq!(engine.cursor(), Cursor::AwaitingLocation);

        engine.advance("Main Road near the market");
        assert_eq!(engine.draft().location.as_deref(), Some("Main Road near the market"));
        assert_eq!(engine.cursor(), Cursor::AwaitingDescription);

        let turn = engine.advance("it is very severe and dangerous");
        assert_eq!(
            engine.draft().description.as_deref(),
            Some("it is very severe and dangerous")
        );
        assert_eq!(engine.draft().urgency, Some(Urgency::High));
        assert_eq!(engine.cursor(), Cursor::AwaitingConfirmation);
        assert!(turn.reply.contains("yes or no"));
        assert!(engine.draft().is_complete());

        let turn = engine.advance("yes please");
        assert_eq!(turn.outcome, TurnOutcome::Submitted);
        let complaint = turn.submitted.unwrap();
        assert_eq!(complaint.issue_type, IssueType::Pothole);
        assert_eq!(complaint.location, "Main Road near the market");
        assert_eq!(complaint.urgency, Urgency::High);
        assert!(turn.reply.contains(&complaint.case_id));
        assert_eq!(engine.cursor(), Cursor::AwaitingIssueType);
        assert!(engine.draft().is_empty());
    }

    #[test]
    fn anything_but_yes_cancels() {
        let mut engine = DialogueEngine::new();
        fill_three_turns(&mut engine);

        let turn = engine.advance("no");
        assert_eq!(turn.outcome, TurnOutcome::Cancelled);
        assert!(turn.submitted.is_none());
        assert_eq!(engine.cursor(), Cursor::AwaitingIssueType);
        assert!(engine.draft().is_empty());
    }

    #[test]
    fn negative_replies_never_submit() {
        for reply in [
            "no, don't submit it",
            "that is not correct",
            "not okay",
            "no, I told you yesterday",
        ] {
            let mut engine = DialogueEngine::new();
            fill_three_turns(&mut engine);

            let turn = engine.advance(reply);
            assert_eq!(turn.outcome, TurnOutcome::Cancelled, "{:?}", reply);
            assert!(turn.submitted.is_none());
            assert!(engine.draft().is_empty());
        }
    }

    #[test]
    fn unknown_issue_reprompts_in_place() {
        let mut engine = DialogueEngine::new();
        let turn = engine.advance("hello");
        assert_eq!(turn.outcome, TurnOutcome::Reprompted);
        assert!(turn.reply.contains(&category_menu()));
        assert_eq!(engine.cursor(), Cursor::AwaitingIssueType);
        assert!(engine.draft().is_empty());
    }

    #[test]
    fn every_state_answers_every_input() {
        let inputs = ["", "hello", "yes", "no", "garbage", "12345", "खड्डा"];
        for step in 0..4 {
            for input in inputs {
                let mut engine = DialogueEngine::new();
                let script = ["there is a pothole", "Linking Road", "small crack"];
                for line in &script[..step] {
                    engine.advance(line);
                }
                let before = engine.cursor().index();
                let turn = engine.advance(input);
                let after = engine.cursor().index();

                assert!(!turn.reply.is_empty());
                assert!(
                    after == before + 1 || after == 0,
                    "step {} input {:?}: {} -> {}",
                    step,
                    input,
                    before,
                    after
                );
            }
        }
    }

    #[test]
    fn medium_urgency_without_keywords() {
        let mut engine = DialogueEngine::new();
        engine.advance("garbage not collected");
        engine.advance("Colaba");
        engine.advance("bins are full since two days");
        assert_eq!(engine.draft().urgency, Some(Urgency::Medium));
    }

    #[test]
    fn restart_discards_partial_draft() {
        let mut engine = DialogueEngine::new();
        engine.advance("street light broken");
        engine.advance("JP Road");

        let prompt = engine.restart();
        assert!(prompt.contains(&category_menu()));
        assert_eq!(engine.cursor(), Cursor::AwaitingIssueType);
        assert!(engine.draft().is_empty());
    }

    #[test]
    fn case_ids_are_unique() {
        let mut ids = CaseIdGenerator::default();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert!(first.starts_with("VC-0001-"));
    }
}

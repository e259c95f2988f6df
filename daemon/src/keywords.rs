use shared::{IssueType, Urgency};

/// Category triggers, checked top to bottom. The first category with any
/// matching trigger wins, so "the drain near the broken light" is drainage.
pub const ISSUE_KEYWORDS: &[(IssueType, &[&str])] = &[
    (
        IssueType::Pothole,
        &["pothole", "pot hole", "road damage", "broken road", "crater", "खड्डा", "गड्ढा"],
    ),
    (
        IssueType::Drainage,
        &["drain", "sewage", "sewer", "gutter", "waterlogging", "manhole", "गटार", "नाली"],
    ),
    (
        IssueType::WaterSupply,
        &["water", "pipe", "leak", "tap", "पाणी", "पानी"],
    ),
    (
        IssueType::Garbage,
        &["garbage", "trash", "waste", "rubbish", "litter", "dump", "कचरा"],
    ),
    (
        IssueType::StreetLight,
        &["street light", "streetlight", "light", "lamp", "दिवा", "बत्ती"],
    ),
];

pub const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "emergency",
    "danger",
    "severe",
    "accident",
    "injur",
    "immediately",
    "critical",
    "flood",
    "तातडी",
    "धोका",
];

/// Whole-word confirmations. Words that also show up in refusals ("not
/// okay", "don't submit", "not correct") are left out.
pub const AFFIRMATIVE_WORDS: &[&str] = &["yes", "yeah", "yep", "confirm", "होय", "हां", "हाँ"];

/// Any of these anywhere in a reply turns it into a refusal.
pub const NEGATION_WORDS: &[&str] = &[
    "no", "not", "nope", "don't", "dont", "never", "cancel", "नाही", "नको", "नहीं",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn classify_issue(utterance: &str) -> Option<IssueType> {
    let lowered = utterance.to_lowercase();
    ISSUE_KEYWORDS
        .iter()
        .find(|(_, triggers)| contains_any(&lowered, triggers))
        .map(|(issue, _)| *issue)
}

pub fn derive_urgency(description: &str) -> Urgency {
    if contains_any(&description.to_lowercase(), URGENCY_KEYWORDS) {
        Urgency::High
    } else {
        Urgency::Medium
    }
}

/// Lowercased words of `utterance`. Apostrophes stay inside words so that
/// "don't" is one token.
fn words(utterance: &str) -> Vec<String> {
    utterance
        .to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| {
            c.is_whitespace() || c == '\u{964}' || (c.is_ascii_punctuation() && c != '\'')
        })
        .map(|word| word.trim_matches('\''))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_affirmative(utterance: &str) -> bool {
    let words = words(utterance);
    let has = |list: &[&str]| words.iter().any(|word| list.contains(&word.as_str()));
    !has(NEGATION_WORDS) && has(AFFIRMATIVE_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify_issue("There is a POTHOLE here"), Some(IssueType::Pothole));
        assert_eq!(classify_issue("Garbage not collected"), Some(IssueType::Garbage));
        assert_eq!(classify_issue("hello"), None);
    }

    #[test]
    fn earlier_category_wins_when_several_match() {
        assert_eq!(
            classify_issue("garbage piled under the street light"),
            Some(IssueType::Garbage)
        );
        assert_eq!(
            classify_issue("water overflowing from the drain"),
            Some(IssueType::Drainage)
        );
    }

    #[test]
    fn marathi_triggers_classify() {
        assert_eq!(classify_issue("इथे कचरा पडला आहे"), Some(IssueType::Garbage));
        assert_eq!(classify_issue("रस्त्यावर खड्डा"), Some(IssueType::Pothole));
    }

    #[test]
    fn urgency_from_description() {
        assert_eq!(derive_urgency("it is very severe and dangerous"), Urgency::High);
        assert_eq!(derive_urgency("Someone got INJURED"), Urgency::High);
        assert_eq!(derive_urgency("a small crack"), Urgency::Medium);
    }

    #[test]
    fn affirmative_detection() {
        assert!(is_affirmative("yes please"));
        assert!(is_affirmative("Yeah, go ahead."));
        assert!(is_affirmative("होय"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("cancel it"));
    }

    #[test]
    fn refusals_and_lookalikes_are_not_affirmative() {
        for reply in [
            "no, don't submit it",
            "No, don\u{2019}t submit it",
            "that is not correct",
            "not okay",
            "no, I told you yesterday",
            "yes? no, wait",
            "नाही",
            "okay",
        ] {
            assert!(!is_affirmative(reply), "{:?}", reply);
        }
    }

    #[test]
    fn words_split_on_punctuation() {
        assert_eq!(words("No, don't!"), vec!["no", "don't"]);
        assert_eq!(words("'yes'"), vec!["yes"]);
    }
}

use serde::{Deserialize, Serialize};

/// Quality boilerplate every positive prompt starts with.
pub const QUALITY_TAGS: &str =
    "score_9, score_8_up, score_7_up, score_6_up, source_anime, high quality, ";

/// Low-quality and anatomy-defect boilerplate every negative prompt starts with.
pub const DEFECT_TAGS: &str =
    "score_4, score_5, score_6, low quality, bad anatomy, worst quality, text, watermark, ";

/// Positive/negative tag strings in the shape the diffusion backend expects.
///
/// Built once per generation call through [`normalize`]; the fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    positive: String,
    negative: String,
}

impl PromptPair {
    pub fn positive(&self) -> &str {
        &self.positive
    }

    pub fn negative(&self) -> &str {
        &self.negative
    }
}

/// Injects the fixed quality and defect tags ahead of the user's text.
///
/// Nothing is trimmed, deduplicated or validated: duplicate and conflicting tags pass through
/// verbatim.
pub fn normalize(user_positive: &str, user_negative: &str) -> PromptPair {
    PromptPair {
        positive: format!("{QUALITY_TAGS}{user_positive}"),
        negative: format!("{DEFECT_TAGS}{user_negative}"),
    }
}

/// Puts exclusion tags at the front of the user negative text.
///
/// Exclusions have to ride ahead of the user's own negative tags, so this runs before
/// [`normalize`].
pub fn prepend_exclusions(exclusions: &[String], user_negative: &str) -> String {
    let tags: Vec<&str> = exclusions
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();
    if tags.is_empty() {
        return user_negative.to_string();
    }
    let joined = tags.join(", ");
    if user_negative.trim().is_empty() {
        return joined;
    }
    format!("{joined}, {user_negative}")
}

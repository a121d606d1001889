use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Positive,
    Negative,
}

const SECTION_LABELS: &[(&str, Section)] = &[
    ("description", Section::Description),
    ("positive prompt", Section::Positive),
    ("positive tags", Section::Positive),
    ("negative prompt", Section::Negative),
    ("negative tags", Section::Negative),
];

/// Assistant reply split into the three labeled sections the system instruction asks for.
///
/// Parsing never fails: a reply without prompt sections is kept whole as `description`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredReply {
    pub description: String,
    pub positive: Option<String>,
    pub negative: Option<String>,
}

impl StructuredReply {
    pub fn parse(reply: &str) -> Self {
        let mut preamble: Vec<&str> = Vec::new();
        let mut description: Option<Vec<&str>> = None;
        let mut positive: Option<Vec<&str>> = None;
        let mut negative: Option<Vec<&str>> = None;
        let mut current: Option<Section> = None;

        for line in reply.lines() {
            if let Some((section, rest)) = match_label(line) {
                current = Some(section);
                let slot = match section {
                    Section::Description => &mut description,
                    Section::Positive => &mut positive,
                    Section::Negative => &mut negative,
                };
                slot.get_or_insert_with(Vec::new).push(rest);
                continue;
            }
            let slot = match current {
                None => {
                    preamble.push(line);
                    continue;
                }
                Some(Section::Description) => &mut description,
                Some(Section::Positive) => &mut positive,
                Some(Section::Negative) => &mut negative,
            };
            if let Some(lines) = slot.as_mut() {
                lines.push(line);
            }
        }

        if positive.is_none() && negative.is_none() {
            return Self {
                description: reply.trim().to_string(),
                positive: None,
                negative: None,
            };
        }

        Self {
            description: description
                .map(|lines| join_section(&lines))
                .unwrap_or_else(|| join_section(&preamble)),
            positive: positive
                .map(|lines| join_section(&lines))
                .filter(|value| !value.is_empty()),
            negative: negative
                .map(|lines| join_section(&lines))
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn has_prompts(&self) -> bool {
        self.positive.is_some() || self.negative.is_some()
    }
}

fn match_label(line: &str) -> Option<(Section, &str)> {
    let stripped = line
        .trim_start()
        .trim_start_matches(|c: char| matches!(c, '#' | '*' | '-' | '>' | ' '));
    let (head, rest) = stripped.split_once(':')?;
    let label = head.trim().trim_end_matches('*').trim().to_ascii_lowercase();
    SECTION_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, section)| (*section, rest.trim_start_matches('*')))
}

fn join_section(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
        .trim_matches(|c: char| c == '`' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::StructuredReply;

    #[test]
    fn parses_three_labeled_sections() {
        let reply = "Description: A knight without a helmet.\n\
                     Positive Prompt: 1boy, solo, silver armor, cape\n\
                     Negative Prompt: helmet, low quality, bad anatomy";
        let parsed = StructuredReply::parse(reply);
        assert_eq!(parsed.description, "A knight without a helmet.");
        assert_eq!(
            parsed.positive.as_deref(),
            Some("1boy, solo, silver armor, cape")
        );
        assert_eq!(
            parsed.negative.as_deref(),
            Some("helmet, low quality, bad anatomy")
        );
        assert!(parsed.has_prompts());
    }

    #[test]
    fn tolerates_markdown_labels_and_multiline_sections() {
        let reply = "Sure!\n\
                     **Positive Prompt:** `1girl, red armor,\n\
                     sword`\n\
                     - negative prompt: glasses";
        let parsed = StructuredReply::parse(reply);
        assert_eq!(parsed.description, "Sure!");
        assert_eq!(parsed.positive.as_deref(), Some("1girl, red armor,\nsword"));
        assert_eq!(parsed.negative.as_deref(), Some("glasses"));
    }

    #[test]
    fn unstructured_reply_falls_back_to_description() {
        let reply = "  Hello! What would you like to draw today?  ";
        let parsed = StructuredReply::parse(reply);
        assert_eq!(parsed.description, "Hello! What would you like to draw today?");
        assert!(!parsed.has_prompts());
    }

    #[test]
    fn description_label_alone_is_not_a_structured_reply() {
        let reply = "Description: just chatting";
        let parsed = StructuredReply::parse(reply);
        assert_eq!(parsed.description, "Description: just chatting");
        assert_eq!(parsed.positive, None);
    }
}

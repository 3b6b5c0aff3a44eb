//! Parsing of generated analysis text into structured arguments and insights
//!
//! The model is instructed to emit titled sections, but output drifts; the
//! parsers here are forgiving and always produce something usable rather
//! than failing on unexpected shapes.

use serde::Deserialize;
use serde::Serialize;

/// One parsed legal argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    pub title: String,
    pub content: String,
    pub supporting_cases: Vec<String>,
    pub strength: String,
}

const STRENGTH_WORDS: &[&str] = &["strong", "moderate", "weak"];

fn looks_like_heading(line: &str) -> bool {
    if line.ends_with(':') {
        return true;
    }
    // All-caps lines (with at least one letter) read as section titles.
    let mut has_letter = false;
    for c in line.chars() {
        if c.is_alphabetic() {
            has_letter = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    has_letter
}

fn detect_strength(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    STRENGTH_WORDS
        .iter()
        .find(|word| lower.contains(*word))
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
}

/// Parse a generated response into titled arguments. Headings start a new
/// argument; strength mentions and case citations inside a section attach to
/// it. An unparseable response collapses into one default argument.
#[must_use]
pub fn parse_arguments(response: &str) -> Vec<Argument> {
    let mut arguments: Vec<Argument> = Vec::new();
    let mut current: Option<Argument> = None;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if looks_like_heading(line) {
            if let Some(argument) = current.take() {
                arguments.push(argument);
            }
            current = Some(Argument {
                title: line.trim_end_matches(':').to_string(),
                content: String::new(),
                supporting_cases: Vec::new(),
                strength: "Medium".to_string(),
            });
        } else if let Some(argument) = current.as_mut() {
            if let Some(strength) = detect_strength(line) {
                argument.strength = strength;
            } else if line.to_lowercase().contains("case") || line.contains("v.") {
                argument.supporting_cases.push(line.to_string());
            } else {
                argument.content.push_str(line);
                argument.content.push(' ');
            }
        }
    }

    if let Some(argument) = current {
        arguments.push(argument);
    }

    if arguments.is_empty() && !response.trim().is_empty() {
        let content: String = response.chars().take(1000).collect();
        arguments.push(Argument {
            title: "Legal Argument".to_string(),
            content,
            supporting_cases: Vec::new(),
            strength: "Medium".to_string(),
        });
    }

    arguments
}

/// Extract the list of insights from a generated response. Looks for an
/// insights section and collects its numbered or bulleted lines; falls back
/// to the first few non-heading lines when no section is found.
#[must_use]
pub fn parse_insights(response: &str) -> Vec<String> {
    let mut insights = Vec::new();
    let mut in_insights = false;

    for line in response.lines() {
        let line = line.trim();

        if line.to_lowercase().contains("insights") {
            in_insights = true;
            continue;
        }
        if line.is_empty() {
            continue;
        }

        if in_insights {
            let first = line.chars().next().unwrap_or(' ');
            if first.is_ascii_digit() || matches!(first, '•' | '-' | '*') {
                let stripped = line
                    .trim_start_matches(|c: char| {
                        c.is_ascii_digit() || matches!(c, '.' | ')' | '•' | '-' | '*')
                    })
                    .trim();
                if !stripped.is_empty() {
                    insights.push(stripped.to_string());
                }
            } else if line.ends_with(':') && !line.starts_with('-') {
                // Another section heading ends the insights block.
                break;
            }
        }
    }

    if insights.is_empty() {
        insights = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.ends_with(':'))
            .take(5)
            .map(str::to_string)
            .collect();
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titled_sections_become_arguments() {
        let response = "\
STATUTORY NOTICE ARGUMENT
The notice period fell short of the statutory minimum. Strength: Strong
See Smith v. Jones for the leading authority.

PROCEDURAL FAIRNESS:
The respondent was not heard before the decision. This is moderate at best.
";
        let arguments = parse_arguments(response);
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].title, "STATUTORY NOTICE ARGUMENT");
        assert_eq!(arguments[0].strength, "Strong");
        assert_eq!(arguments[0].supporting_cases.len(), 1);
        assert_eq!(arguments[1].title, "PROCEDURAL FAIRNESS");
        assert_eq!(arguments[1].strength, "Moderate");
    }

    #[test]
    fn unstructured_text_collapses_to_one_argument() {
        let arguments = parse_arguments("just a plain paragraph of analysis with no headings");
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].title, "Legal Argument");
        assert_eq!(arguments[0].strength, "Medium");
    }

    #[test]
    fn empty_response_parses_to_nothing() {
        assert!(parse_arguments("").is_empty());
    }

    #[test]
    fn numbered_insights_are_extracted() {
        let response = "\
## Key Insights
1. The statistical disparity shifts the burden. Strength: Strong
2. Replacement hiring suggests intent. Strength: Moderate

## Key Arguments:
";
        let insights = parse_insights(response);
        assert_eq!(insights.len(), 2);
        assert!(insights[0].starts_with("The statistical disparity"));
    }

    #[test]
    fn insights_fall_back_to_leading_lines() {
        let response = "First observation.\nSecond observation.\n";
        let insights = parse_insights(response);
        assert_eq!(insights.len(), 2);
    }
}

//! Query classification
//!
//! Labels a query as case-specific or general to drive prompt-template
//! selection. Two signals are summed per label: literal keyword hits and
//! regex pattern hits, with pattern hits weighted double. Deterministic by
//! construction.

use regex::Regex;

use super::QueryClassification;
use super::QueryLabel;

const CASE_SPECIFIC_KEYWORDS: &[&str] = &[
    "case",
    "cases",
    "ruling",
    "rulings",
    "decision",
    "decisions",
    "precedent",
    "precedents",
    "judgment",
    "judgments",
    "verdict",
    "verdicts",
    "court",
    "courts",
    "judge",
    "judges",
    "tribunal",
    "find similar",
    "similar cases",
    "relevant cases",
    "find cases",
    "example cases",
    "show me cases",
    "search for cases",
    "what cases",
    "recent cases",
    "specific cases",
];

const GENERAL_KEYWORDS: &[&str] = &[
    "what is",
    "how to",
    "explain",
    "definition",
    "define",
    "meaning",
    "process",
    "procedure",
    "guidelines",
    "steps",
    "requirements",
    "overview",
    "summary",
    "introduction",
    "basics",
    "fundamental",
    "principles",
    "concept",
    "theory",
    "framework",
    "structure",
    "approach",
    "strategy",
    "advice",
    "help",
    "guidance",
    "tips",
];

const CASE_SPECIFIC_PATTERNS: &[&str] = &[
    r"(find|show|give|provide).*case",
    r"(previous|prior|past|similar).*case",
    r"case.*(about|related to|involving|concerning)",
    r"(example|instance).*(of|where)",
    r"v\.",
    r"\[\d{4}\]",
    r"\d{4}.*WASAT",
];

const GENERAL_PATTERNS: &[&str] = &[
    r"(what|how|why|when|where|who).*(is|are|do|does|should|would|could|can)",
    r"explain.*(how|why|what)",
    r"(meaning|definition).*of",
    r"(steps|process|procedure).*(for|to|in)",
];

pub struct QueryClassifier {
    case_specific_patterns: Vec<Regex>,
    general_patterns: Vec<Regex>,
}

impl QueryClassifier {
    #[must_use]
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("built-in pattern compiles"))
                .collect()
        };
        Self {
            case_specific_patterns: compile(CASE_SPECIFIC_PATTERNS),
            general_patterns: compile(GENERAL_PATTERNS),
        }
    }

    /// Classify a query. Ties resolve to case-specific; a query matching
    /// nothing is general at the confidence floor.
    #[must_use]
    pub fn classify(&self, query: &str) -> QueryClassification {
        let query = query.to_lowercase();

        let case_keyword_hits = CASE_SPECIFIC_KEYWORDS
            .iter()
            .filter(|keyword| query.contains(*keyword))
            .count();
        let general_keyword_hits = GENERAL_KEYWORDS
            .iter()
            .filter(|keyword| query.contains(*keyword))
            .count();

        let case_pattern_hits = self
            .case_specific_patterns
            .iter()
            .filter(|pattern| pattern.is_match(&query))
            .count();
        let general_pattern_hits = self
            .general_patterns
            .iter()
            .filter(|pattern| pattern.is_match(&query))
            .count();

        let case_score = case_keyword_hits + case_pattern_hits * 2;
        let general_score = general_keyword_hits + general_pattern_hits * 2;

        if case_score == 0 && general_score == 0 {
            return QueryClassification {
                label: QueryLabel::General,
                confidence: 0.5,
            };
        }

        let total = (case_score + general_score) as f32;
        let differential = (case_score as f32 - general_score as f32).abs();
        let confidence = (differential / total).clamp(0.5, 0.95);

        let label = if case_score >= general_score {
            QueryLabel::CaseSpecific
        } else {
            QueryLabel::General
        };

        QueryClassification { label, confidence }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_deterministic() {
        let classifier = QueryClassifier::new();
        let first = classifier.classify("find cases about commercial lease termination");
        for _ in 0..10 {
            let next = classifier.classify("find cases about commercial lease termination");
            assert_eq!(next.label, first.label);
            assert!((next.confidence - first.confidence).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn confidence_stays_within_bounds() {
        let classifier = QueryClassifier::new();
        let queries = [
            "find cases about lease termination",
            "what is the meaning of strata title",
            "Smith v. Jones precedent",
            "explain how to lodge an appeal and what cases apply",
            "hello",
            "",
        ];
        for query in queries {
            let classification = classifier.classify(query);
            assert!(
                (0.5..=0.95).contains(&classification.confidence),
                "confidence {} out of bounds for {query:?}",
                classification.confidence
            );
        }
    }

    #[test]
    fn citation_patterns_imply_case_specific() {
        let classifier = QueryClassifier::new();
        let classification = classifier.classify("what happened in [2023] WASAT 45?");
        assert_eq!(classification.label, QueryLabel::CaseSpecific);
    }

    #[test]
    fn how_to_questions_are_general() {
        let classifier = QueryClassifier::new();
        let classification = classifier.classify("explain how the review process works");
        assert_eq!(classification.label, QueryLabel::General);
    }

    #[test]
    fn no_signal_defaults_to_general_at_floor() {
        let classifier = QueryClassifier::new();
        let classification = classifier.classify("zebra umbrella");
        assert_eq!(classification.label, QueryLabel::General);
        assert!((classification.confidence - 0.5).abs() < f32::EPSILON);
    }
}

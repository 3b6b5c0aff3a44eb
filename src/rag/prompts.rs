//! Prompt templates for retrieval-augmented generation

use std::collections::HashMap;

use super::QueryLabel;

/// Template with `{{variable}}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template. Variables without a supplied value are left
    /// in place.
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut rendered = self.template.clone();
        for variable in &self.variables {
            if let Some(value) = values.get(variable.as_str()) {
                rendered = rendered.replace(&format!("{{{{{variable}}}}}"), value);
            }
        }
        rendered
    }

    /// Placeholder names in order of first appearance
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

fn extract_variables(template: &str) -> Vec<String> {
    let mut variables: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let name = &after[..end];
        if !name.is_empty() && !variables.iter().any(|v| v == name) {
            variables.push(name.to_string());
        }
        rest = &after[end + 2..];
    }
    variables
}

/// Guidance spliced into the chat prompt depending on query classification
pub struct ResponseGuidance {
    pub instruction: &'static str,
    pub format_template: &'static str,
}

/// Appended to the arguments template when only insights are wanted
pub const INSIGHTS_SUFFIX: &str = r#"
Focus on generating KEY INSIGHTS only. For each insight, include an assessment of its strength (Strong, Moderate, or Weak) based on:
- Strong: Well-supported by multiple legal precedents, clear factual evidence, or established legal principles
- Moderate: Supported by some precedents or factual evidence, but with some limitations
- Weak: Limited supporting evidence, potentially contested, or based on relatively untested legal theories

Format your response as a list of insights, each with a strength assessment at the end like this:
1. [Insight text]. Strength: Strong
2. [Insight text]. Strength: Moderate
"#;

/// Appended to the arguments template when only arguments are wanted
pub const ARGUMENTS_SUFFIX: &str =
    "\n\nFocus on generating LEGAL ARGUMENTS only. Format your response with clear argument titles.";

/// The prompt set used by the legal assistant surfaces
pub struct LegalPrompts;

impl LegalPrompts {
    /// Base chat template. The classification-specific instruction and
    /// format template are spliced in; conversation history (possibly empty)
    /// sits immediately before the query line.
    #[must_use]
    pub fn chat() -> PromptTemplate {
        PromptTemplate::new(
            r####"
You are a helpful legal assistant that helps lawyers find and understand relevant cases.
{{history}}
USER QUERY: {{query}}

RELEVANT CASES:
{{context}}

{{instruction}}

Based on the above relevant cases, provide a comprehensive and accurate response to the user's query.
If the provided cases are not relevant to the query or if there's not enough information, say so clearly -
DO NOT make up information or hallucinate content that isn't supported by the retrieved cases.

Your response should:
1. Be directly relevant to the query
2. Cite specific cases and their relevant parts when appropriate
3. Maintain legal accuracy
4. Use professional legal language
5. Format your response using extremely compact markdown following these EXACT SPACING rules:
   - Use headings (##, ###) to structure your response
   - Place EXACTLY ONE blank line after each section
   - Each case should start with "### Case N: [**Title**](case_url) (Citation_Number)" format
   - Make both the case title and citation number clickable with the same URL
   - Place EXACTLY ONE blank line between sections
   - For bullet points: NO blank lines between list items
   - For bullet points: ONE blank line after the last bullet point before new content
   - NEVER use more than one consecutive blank line anywhere
   - ALL case names and citation numbers should be clickable links to the case URL

6. Structure your response following this approach:
{{format_template}}

CRITICAL: You MUST use the exact case URLs provided in the context to create the markdown links. Make both the case title and citation number clickable links to the same case URL.

CRITICAL: Pay very close attention to spacing. Do not add multiple blank lines between paragraphs or list items. Use exactly one blank line between paragraphs or sections.
"####,
        )
    }

    /// Classification-driven answer-structure guidance
    #[must_use]
    pub fn response_guidance(label: QueryLabel) -> ResponseGuidance {
        match label {
            QueryLabel::CaseSpecific => ResponseGuidance {
                instruction: r#"
Your response should prioritize specific case details first:
1. Start with the most relevant cases that directly address the query
2. For each case, provide detailed analysis of the relevant facts, reasoning, and outcome
3. After presenting the cases, provide general legal information that helps understand the context
4. Ensure all case citations are accurate and include URLs where available
5. Structure the response with cases first, then general information
"#,
                format_template: r#"
## Relevant Cases for [Query Topic]
Brief introduction focusing on why these specific cases are relevant.

### Case 1: [**Smith v. Jones**](https://example.com/case1) (2023 WASAT 123)
* **Summary:** Details of this specific case and its relevance to the query
* **Key Points:**
* Specifics of this case's facts and reasoning
* How this case directly addresses the query
* Outcome and implications

### Case 2: [**Adams v. Miller**](https://example.com/case2) (2022 WASAT 456)
* **Summary:** Details of this specific case and why it's relevant
* **Key Points:**
* Specific facts and reasoning from this case
* Directly relevant findings

## General Legal Information
Now that we've examined the specific cases, here's some general context:
* General explanation of the legal principles involved
* Broader context for understanding these types of cases
"#,
            },
            QueryLabel::General => ResponseGuidance {
                instruction: r#"
Your response should prioritize general legal information first:
1. Start with a clear explanation of the general legal concepts, principles, or processes
2. Provide comprehensive information about the legal topic without focusing on specific cases
3. After explaining the general information, cite a few relevant cases as examples
4. Use the cases to illustrate how the general principles are applied in practice
5. Structure the response with general information first, then supporting cases
6. Ensure consistent spacing - do not add more than one blank line between any elements
"#,
                format_template: r#"
## [Legal Topic] Explained
Comprehensive explanation of the general legal concept, principle, or process that addresses the query directly.

* Detailed information about how this works in the legal system
* Clear explanation of legal requirements and considerations
* Practical information for understanding the topic

## Relevant Case Examples
Here are some cases that illustrate these principles:

### Case 1: [**Smith v. Jones**](https://example.com/case1) (2023 WASAT 123)
* **Summary:** Brief overview focused on how this case illustrates the general principle
* **Key Points:**
* How this case demonstrates the application of the legal principles
* Key findings relevant to the general topic

### Case 2: [**Adams v. Miller**](https://example.com/case2) (2022 WASAT 456)
* **Summary:** Another example showing how courts have applied these principles
* **Key Points:**
* Specific aspects that reinforce the general information
* Outcome that demonstrates the principles in action
"#,
            },
        }
    }

    /// Template for the argument-building surface
    #[must_use]
    pub fn build_arguments() -> PromptTemplate {
        PromptTemplate::new(
            r####"
You are a legal analysis assistant specializing in Australian law and State Administrative Tribunal (SAT) decisions.

CASE CONTENT: {{content}}
CASE TOPIC: {{topic}}

SIMILAR CASES AND RELEVANT CHUNKS:
{{context}}

Your task is to provide a comprehensive legal analysis structured in exactly four sections:

1. Key insights about this case which happened in Australia and its relationship to Australian legal precedents
2. Strong legal arguments that can be made based on Australian law
3. Potential counter-arguments from the opposing side
4. Summary of the most relevant Australian cases

CRITICAL FORMATTING REQUIREMENTS:
- Use precise, minimal formatting with NO extra blank lines
- Start each section with a clean heading (e.g., "## Key Insights")
- Place ONE blank line after each heading
- Place ONE blank line between items within a section
- Format all text in a clean, readable style with no unnecessary spacing
- DO NOT include any disclaimers, warnings, or self-referential text
- DO NOT include numbering before section items (1., 2., etc.)

Follow these EXACT structure guidelines:

## Key Insights
Present 3-4 clear, concise legal insights relevant to Australian law. Format as:

**Insight Title**
Brief explanation in 1-2 concise sentences focusing on Australian legal principles.

## Key Arguments
Present 2-3 strong legal arguments. Format as:

**Argument Title**
**Legal Reasoning**: Concise explanation with references to specific Australian legislation or SAT precedents.
**Supporting Cases**: Cite only Australian cases with proper citation format.
**Supporting Legislation**: Reference relevant sections of Australian legislation.

## Counter-Arguments
Present 1-2 opposing arguments. Format as:

**Counter-Argument Title**
**Counter**: Brief explanation of the opposing position.
**Rebuttal**: How to address this counter-argument.

## Related Cases
Present relevant Australian cases. Format as:

### [Case Name](case_url)
Concise summary of the case and its relevance to the current matter. Focus on key holdings relevant to this case.
**Similarity**: XX.X%

Remember to focus EXCLUSIVELY on Australian law, SAT decisions, and relevant legislation. Never reference non-Australian legal principles, cases, or statutes.
"####,
        )
    }

    /// Template rendered once per reasoning step
    #[must_use]
    pub fn step_reasoning() -> PromptTemplate {
        PromptTemplate::new(
            r#"
You are a legal analysis assistant specializing in Australian law and State Administrative Tribunal (SAT) decisions.

CASE CONTENT: {{content}}
CASE TOPIC: {{topic}}
SIMILAR CASES AND RELEVANT CHUNKS:
{{context}}
STEP: {{step}}
PREVIOUS REASONING: {{previous_steps}}

Based on the case content, similar cases, and any previous reasoning steps, carefully perform the following step:

{{step_instructions}}

Consider these key elements in your analysis:
1. Australian legislation and SAT precedents that are relevant to this case
2. The specific facts and circumstances described in the case content
3. Legal principles established in the similar cases provided
4. The strength of arguments based on precedential value and factual alignment

Provide detailed reasoning that shows your analysis process, citing specific elements from the case content and similar cases. Focus EXCLUSIVELY on Australian law, SAT decisions, and relevant legislation.

FORMAT YOUR RESPONSE:
- Use precise, professional legal language
- Cite specific cases with proper citation format
- Reference relevant sections of Australian legislation
- Present your analysis in a clear, structured manner
- Avoid repetition and unnecessary preambles
"#,
        )
    }

    /// Single-call variant: one prompt instructing the model to perform the
    /// full three-step analysis internally and emit one structured document.
    #[must_use]
    pub fn single_call_reasoning() -> PromptTemplate {
        PromptTemplate::new(
            r####"
# Legal Argument Generation Task

## Input
Case Content: {{content}}
Topic: {{topic}}

## Context (Similar Cases)
{{context}}

## Instructions
You are a legal expert tasked with generating strong legal arguments. Follow this 3-step reasoning process carefully:

STEP 1: ANALYZE CASE & COMPARE
Analyze the provided case content and compare it with similar cases. Identify key legal issues and relevant legal principles/rules.
Generate 3-4 key insights specific to applying these principles to the case facts, noting similarities/differences with precedents.
For each insight, assess its strength (Strong, Moderate, Weak) based on applicable law and precedents.

STEP 2: IDENTIFY & EVALUATE ARGUMENTS
Based on your analysis, identify potential legal arguments. For each argument:
(1) State the relevant legal RULE with specific legislation and precedent
(2) APPLY the rule by comparing facts of the input case to cited precedents
(3) Evaluate argument STRENGTH (Strong/Moderate/Weak)

STEP 3: FORMULATE FINAL ARGUMENTS
Formulate final arguments using IRAC structure:
(1) State the ISSUE
(2) State the RULE (legislation and precedent)
(3) APPLY the rule to client's facts
(4) CONCLUDE on the argument and its STRENGTH

## Output Format
Begin with a heading "LEGAL ANALYSIS: [TOPIC]"

Under "## Key Insights", list each insight with its strength in the format:
1. [Insight title]: [Insight explanation]. Strength: [Strong/Moderate/Weak]

Under "## Key Arguments", structure each argument with:
- Title: The legal issue/claim
- Legal Reasoning: The rule and application
- Supporting Cases: Cases cited
- Strength: Strong/Moderate/Weak
"####,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_extracted_in_order() {
        let template = PromptTemplate::new("{{a}} and {{b}}, then {{a}} again");
        assert_eq!(template.variables(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let template = PromptTemplate::new("{{name}}: {{name}} ({{role}})");
        let mut values = HashMap::new();
        values.insert("name", "Smith".to_string());
        values.insert("role", "applicant".to_string());
        assert_eq!(template.render(&values), "Smith: Smith (applicant)");
    }

    #[test]
    fn missing_values_leave_placeholders() {
        let template = PromptTemplate::new("{{present}} {{absent}}");
        let mut values = HashMap::new();
        values.insert("present", "here".to_string());
        assert_eq!(template.render(&values), "here {{absent}}");
    }

    #[test]
    fn step_template_exposes_the_expected_variables() {
        let template = LegalPrompts::step_reasoning();
        let variables = template.variables();
        for expected in ["content", "topic", "context", "step", "previous_steps", "step_instructions"] {
            assert!(
                variables.iter().any(|v| v == expected),
                "missing variable {expected}"
            );
        }
    }

    #[test]
    fn guidance_differs_by_label() {
        let case = LegalPrompts::response_guidance(QueryLabel::CaseSpecific);
        let general = LegalPrompts::response_guidance(QueryLabel::General);
        assert!(case.instruction.contains("cases first"));
        assert!(general.instruction.contains("general legal information first"));
    }
}

//! Request text sent to text-in/text-out classifier services.

use std::fmt::Write;

use super::ClassificationRequest;

const INSTRUCTIONS: &str = "\
Classify each loop candidate for safe parallelization.

Look for shared variable writes, loop-carried dependencies, the algorithm
shape (embarrassingly parallel, reduction, sequential) and candidates that
are not parallel opportunities at all.
";

const RESPONSE_FORMAT: &str = r#"
Return ONLY one JSON object of this form:
{
  "candidate_1": {
    "classification": "safe_parallel|requires_runtime_check|not_parallel|logic_issue",
    "reasoning": "technical reason",
    "confidence": 0.85,
    "transformations": ["suggested directive or rewrite"],
    "tests_recommended": ["validation test"],
    "logic_issue_type": "none|false_positive|non_parallel_algorithm|data_race"
  },
  "candidate_2": { ... }
}
"#;

/// Renders a batch as a numbered prompt; item `n` is answered under
/// `candidate_n`.
pub fn render_prompt(batch: &[ClassificationRequest]) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    for (i, request) in batch.iter().enumerate() {
        let _ = write!(
            prompt,
            "\nCandidate {}:\n- File: {}\n- Function: {}\n- Line: {}\n- Type: {}\n- Reason: {}\n- Suggested: {}\n- Code:\n{}\n",
            i + 1,
            request.file.display(),
            or_placeholder(&request.function, "unknown"),
            request.line,
            request.pattern_type,
            or_placeholder(&request.reason, "none given"),
            or_placeholder(&request.suggested_directive, "none"),
            request.snippet,
        );
    }
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

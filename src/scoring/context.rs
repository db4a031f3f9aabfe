//! Regex heuristics over the text surrounding a candidate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfidenceConfig;
use crate::source::call_count;

/// Bodies at or under this many lines count as short
const SHORT_BODY_LINES: usize = 5;
/// More than this many arithmetic/assignment operators counts as dense
const ARITHMETIC_DENSITY_MIN: usize = 3;

static POINTER_ARITHMETIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\w+\s*[+\-]|\w+\s*[+\-]\s*\*").unwrap());
static COMPLEX_CONTROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:if|else|switch|goto)\b.*\b(?:if|else|switch|goto)\b").unwrap()
});
static GLOBAL_STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:extern|static)\s+\w+").unwrap());
static DYNAMIC_MEMORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:malloc|calloc|free|new|delete|realloc)\b").unwrap());
static NESTED_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\s*\([^)]*\w+\([^)]*\)").unwrap());
static VOLATILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bvolatile\b").unwrap());
static INLINE_ASM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:__asm__|asm)\b").unwrap());

static SIMPLE_INDEXING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*\]\s*[=+\-*/]").unwrap());
static BOUNDED_LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"for\s*\(\s*(?:\w+\s+)?\w+\s*=\s*\w+\s*;\s*\w+\s*(?:<|<=|>|>=)\s*\w+").unwrap()
});
static NON_LOCAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:extern|static|global)\b").unwrap());
static ARITHMETIC_OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+\-*/=]").unwrap());
static READ_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bconst\b").unwrap());
static LOOP_INDEX_ACCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*i\s*\]").unwrap());

/// Risk and boost factors found in a context window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysis {
    /// Sum of boosts minus risks, clamped to the configured bounds
    pub modifier: f64,
    pub risk_factors: Vec<String>,
    pub boost_factors: Vec<String>,
}

impl ContextAnalysis {
    pub fn raw_modifier(&self, config: &ConfidenceConfig) -> f64 {
        let risks: f64 = self
            .risk_factors
            .iter()
            .map(|f| risk_weight(f, config))
            .sum();
        let boosts: f64 = self
            .boost_factors
            .iter()
            .map(|f| boost_weight(f, config))
            .sum();
        boosts - risks
    }
}

fn risk_weight(factor: &str, config: &ConfidenceConfig) -> f64 {
    let risks = &config.risks;
    match factor {
        "function_calls" => risks.function_calls,
        "pointer_arithmetic" => risks.pointer_arithmetic,
        "complex_control_flow" => risks.complex_control_flow,
        "global_variables" => risks.global_variables,
        "dynamic_memory" => risks.dynamic_memory,
        "recursion" => risks.recursion,
        "volatile_access" => risks.volatile_access,
        "inline_assembly" => risks.inline_assembly,
        _ => 0.0,
    }
}

fn boost_weight(factor: &str, config: &ConfidenceConfig) -> f64 {
    let boosts = &config.boosts;
    match factor {
        "simple_indexing" => boosts.simple_indexing,
        "bounded_loop" => boosts.bounded_loop,
        "local_variables" => boosts.local_variables,
        "arithmetic_density" => boosts.arithmetic_density,
        "read_only_data" => boosts.read_only_data,
        "loop_index_access" => boosts.loop_index_access,
        "short_body" => boosts.short_body,
        _ => 0.0,
    }
}

pub fn detect_risks(context: &str) -> Vec<String> {
    let checks: [(&str, bool); 8] = [
        ("function_calls", call_count(context) > 0),
        ("pointer_arithmetic", POINTER_ARITHMETIC.is_match(context)),
        ("complex_control_flow", COMPLEX_CONTROL.is_match(context)),
        ("global_variables", GLOBAL_STATE.is_match(context)),
        ("dynamic_memory", DYNAMIC_MEMORY.is_match(context)),
        ("recursion", NESTED_CALL.is_match(context)),
        ("volatile_access", VOLATILE.is_match(context)),
        ("inline_assembly", INLINE_ASM.is_match(context)),
    ];
    named_hits(&checks)
}

pub fn detect_boosts(context: &str) -> Vec<String> {
    let checks: [(&str, bool); 7] = [
        ("simple_indexing", SIMPLE_INDEXING.is_match(context)),
        ("bounded_loop", BOUNDED_LOOP.is_match(context)),
        ("local_variables", !NON_LOCAL.is_match(context)),
        (
            "arithmetic_density",
            ARITHMETIC_OPERATOR.find_iter(context).count() > ARITHMETIC_DENSITY_MIN,
        ),
        ("read_only_data", READ_ONLY.is_match(context)),
        ("loop_index_access", LOOP_INDEX_ACCESS.is_match(context)),
        ("short_body", context.lines().count() <= SHORT_BODY_LINES),
    ];
    named_hits(&checks)
}

fn named_hits(checks: &[(&str, bool)]) -> Vec<String> {
    checks
        .iter()
        .filter(|(_, hit)| *hit)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Analyzes a context window. Blank context is neutral.
pub fn analyze_context(context: &str, config: &ConfidenceConfig) -> ContextAnalysis {
    if context.trim().is_empty() {
        return ContextAnalysis::default();
    }

    let mut analysis = ContextAnalysis {
        modifier: 0.0,
        risk_factors: detect_risks(context),
        boost_factors: detect_boosts(context),
    };
    analysis.modifier = analysis
        .raw_modifier(config)
        .clamp(config.context_modifier_min, config.context_modifier_max);
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_clean_vector_loop_hits_upper_bound() {
        let context = indoc! {"
            #pragma omp parallel for simd
            for(int i=0;i<n;i++){c[i]=a[i]+b[i];}
        "};
        let config = ConfidenceConfig::default();
        let analysis = analyze_context(context, &config);
        assert!(analysis.risk_factors.is_empty(), "{:?}", analysis.risk_factors);
        assert!(analysis.boost_factors.contains(&"bounded_loop".to_string()));
        assert!(analysis.boost_factors.contains(&"loop_index_access".to_string()));
        assert_eq!(analysis.modifier, config.context_modifier_max);
    }

    #[test]
    fn test_risky_context_hits_lower_bound() {
        let context = indoc! {"
            static int counter;
            for (p = head; p; p = p->next) {
                if (p->flag) { free(p->data); } else if (check(p)) { asm(\"nop\"); }
                volatile int *q = *base + offset;
                counter = update(counter, compute(p));
            }
        "};
        let config = ConfidenceConfig::default();
        let analysis = analyze_context(context, &config);
        for factor in [
            "function_calls",
            "complex_control_flow",
            "global_variables",
            "dynamic_memory",
            "recursion",
            "volatile_access",
            "inline_assembly",
        ] {
            assert!(analysis.risk_factors.contains(&factor.to_string()), "missing {factor}");
        }
        assert_eq!(analysis.modifier, config.context_modifier_min);
    }

    #[test]
    fn test_control_keywords_are_not_calls() {
        let risks = detect_risks("for (i = 0; i < n; i++) { if (x) while (y) y--; }");
        assert!(!risks.contains(&"function_calls".to_string()));
    }

    #[test]
    fn test_blank_context_is_neutral() {
        let analysis = analyze_context("  \n ", &ConfidenceConfig::default());
        assert_eq!(analysis, ContextAnalysis::default());
    }
}

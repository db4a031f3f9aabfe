//! Directive syntax table and clause checking.

/// Clauses that take no argument list
const BARE_CLAUSES: &[&str] = &[
    "nowait",
    "untied",
    "mergeable",
    "nogroup",
    "ordered",
    "inbranch",
    "notinbranch",
];

pub const SPEC_VERSION: &str = "5.2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveRule {
    pub name: &'static str,
    pub clauses: &'static [&'static str],
}

/// Known directives in lookup order
pub const DIRECTIVE_RULES: &[DirectiveRule] = &[
    DirectiveRule {
        name: "parallel",
        clauses: &[
            "num_threads", "if", "default", "private", "firstprivate", "shared", "copyin",
            "reduction", "proc_bind",
        ],
    },
    DirectiveRule {
        name: "parallel for",
        clauses: &[
            "private", "firstprivate", "lastprivate", "reduction", "schedule", "collapse",
            "ordered", "nowait",
        ],
    },
    DirectiveRule {
        name: "simd",
        clauses: &[
            "private", "lastprivate", "reduction", "collapse", "safelen", "simdlen", "linear",
            "aligned", "if",
        ],
    },
    DirectiveRule {
        name: "parallel for simd",
        clauses: &[
            "private", "firstprivate", "lastprivate", "reduction", "schedule", "collapse",
            "safelen", "simdlen", "linear", "aligned",
        ],
    },
    DirectiveRule {
        name: "task",
        clauses: &[
            "if", "untied", "default", "private", "firstprivate", "shared", "depend", "priority",
        ],
    },
    DirectiveRule {
        name: "taskloop",
        clauses: &[
            "shared", "private", "firstprivate", "lastprivate", "reduction", "if", "untied",
            "collapse", "grainsize", "num_tasks",
        ],
    },
];

/// A normalized directive split into its name and clause tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    pub name: String,
    pub clauses: Vec<String>,
}

impl ParsedDirective {
    /// Clause names without their argument lists
    pub fn clause_names(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|c| clause_name(c))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    /// Directive is in the table; notes may carry clause warnings
    Known { notes: Vec<String> },
    /// Directive is not in the table but overlaps a known one
    Partial { notes: Vec<String> },
    /// Nothing recognisable
    Unknown { notes: Vec<String> },
}

impl SyntaxVerdict {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }

    pub fn into_notes(self) -> Vec<String> {
        match self {
            Self::Known { notes } | Self::Partial { notes } | Self::Unknown { notes } => notes,
        }
    }
}

pub fn clause_name(token: &str) -> &str {
    token.split('(').next().unwrap_or(token)
}

/// Splits a normalized directive. Tokens carrying `(` and everything up to
/// the matching `)` are clauses, as are known bare clauses.
pub fn parse(normalized: &str) -> ParsedDirective {
    let mut name_parts = Vec::new();
    let mut clauses: Vec<String> = Vec::new();
    let mut in_clause = false;

    for token in normalized.split_whitespace() {
        if in_clause {
            if let Some(last) = clauses.last_mut() {
                last.push(' ');
                last.push_str(token);
            }
            in_clause = !token.contains(')');
        } else if token.contains('(') {
            clauses.push(token.to_string());
            in_clause = !token.contains(')');
        } else if BARE_CLAUSES.contains(&token) && !name_parts.is_empty() {
            clauses.push(token.to_string());
        } else {
            name_parts.push(token);
        }
    }

    ParsedDirective {
        name: name_parts.join(" "),
        clauses,
    }
}

pub fn lookup(name: &str) -> Option<&'static DirectiveRule> {
    DIRECTIVE_RULES.iter().find(|rule| rule.name == name)
}

/// Checks a normalized directive against the table
pub fn check(normalized: &str) -> SyntaxVerdict {
    let parsed = parse(normalized);
    if parsed.name.is_empty() {
        return SyntaxVerdict::Unknown {
            notes: vec!["empty directive".to_string()],
        };
    }

    let Some(rule) = lookup(&parsed.name) else {
        let partial = DIRECTIVE_RULES
            .iter()
            .find(|rule| parsed.name.contains(rule.name) || rule.name.contains(parsed.name.as_str()));
        return match partial {
            Some(rule) => SyntaxVerdict::Partial {
                notes: vec![format!("Directive similar to known pattern: {}", rule.name)],
            },
            None => SyntaxVerdict::Unknown {
                notes: vec![format!("Unknown directive: {}", parsed.name)],
            },
        };
    };

    let mut notes = vec![format!("Valid OpenMP {} directive", SPEC_VERSION)];
    notes.extend(
        parsed
            .clause_names()
            .filter(|name| !rule.clauses.contains(name))
            .map(|name| format!("Warning: Clause {} not standard for {}", name, rule.name)),
    );
    SyntaxVerdict::Known { notes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_splits_clauses() {
        let parsed = parse("parallel for reduction(+: sum) schedule(static) nowait");
        assert_eq!(parsed.name, "parallel for");
        assert_eq!(
            parsed.clauses,
            vec!["reduction(+: sum)", "schedule(static)", "nowait"]
        );
        let names: Vec<_> = parsed.clause_names().collect();
        assert_eq!(names, vec!["reduction", "schedule", "nowait"]);
    }

    #[test]
    fn test_known_directive_is_valid() {
        let verdict = check("parallel for private(i)");
        assert_eq!(
            verdict,
            SyntaxVerdict::Known {
                notes: vec!["Valid OpenMP 5.2 directive".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_clause_is_advisory() {
        let verdict = check("simd num_threads(4)");
        assert!(verdict.is_valid());
        let notes = verdict.into_notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[1].contains("num_threads"));
    }

    #[test]
    fn test_partial_match() {
        let verdict = check("parallel sections");
        assert!(matches!(verdict, SyntaxVerdict::Partial { .. }));
    }

    #[test]
    fn test_unknown_directive() {
        let verdict = check("barrierz");
        assert!(!verdict.is_valid());
        assert_eq!(verdict.into_notes(), vec!["Unknown directive: barrierz".to_string()]);
    }

    #[test]
    fn test_empty_directive() {
        assert!(!check("").is_valid());
        assert!(!check("reduction(+:x)").is_valid());
    }
}

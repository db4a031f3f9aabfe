//! Text heuristics shared by the hotspot detector, block partitioner, scorer
//! and fingerprinting.
//!
//! None of this is a parser. Loops are found by their header shape and their
//! extent by brace counting, which is good enough for the C/C++ kernels this
//! crate looks at and fails closed (the region is skipped) otherwise.

use once_cell::sync::Lazy;
use regex::Regex;

/// Identifiers followed by `(` that are not calls
pub const CONTROL_KEYWORDS: &[&str] = &["for", "while", "if", "switch", "return", "sizeof"];

/// Lines after a loop header searched for its opening brace
pub const BRACE_LOOKAHEAD: usize = 2;

static LOOP_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:for|while)\s*\(|^do\s*(?:\{|$)").unwrap());

static LOOP_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:for|while)\s*\(|\bdo\s*\{").unwrap());

static CALL_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

static SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:[A-Za-z_][\w:<>,]*[\s\*&]+)+)([A-Za-z_][\w:~]*)\s*\([^;]*$").unwrap()
});

const NON_TYPE_PREFIXES: &[&str] = &["return", "else", "case", "new", "delete", "throw", "goto"];

/// Line-oriented view of a source file with 1-based line numbers.
#[derive(Debug, Clone)]
pub struct SourceText<'a> {
    lines: Vec<&'a str>,
}

/// Span of a brace-delimited loop, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSpan {
    pub start: usize,
    pub end: usize,
}

impl LoopSpan {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }
}

impl<'a> SourceText<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line by 1-based number
    pub fn line(&self, number: usize) -> Option<&'a str> {
        number.checked_sub(1).and_then(|i| self.lines.get(i).copied())
    }

    /// Lines in an inclusive 1-based span, clipped to the file
    pub fn span_lines(&self, start: usize, end: usize) -> &[&'a str] {
        let from = start.saturating_sub(1).min(self.lines.len());
        let to = end.min(self.lines.len()).max(from);
        &self.lines[from..to]
    }

    pub fn span_text(&self, span: LoopSpan) -> String {
        self.span_lines(span.start, span.end).join("\n")
    }

    /// Text of `radius` lines on each side of `line`
    pub fn context(&self, line: usize, radius: usize) -> String {
        let start = line.saturating_sub(radius).max(1);
        self.span_lines(start, line + radius).join("\n")
    }

    /// Context window capped at `max_chars` characters
    pub fn snippet(&self, line: usize, radius: usize, max_chars: usize) -> String {
        truncate_chars(&self.context(line, radius), max_chars)
    }

    /// 1-based line numbers whose trimmed text starts a loop
    pub fn loop_headers(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| is_loop_header(line))
            .map(|(i, _)| i + 1)
    }

    /// Extent of the loop whose header is on `header`.
    ///
    /// The opening brace must appear on the header line or within
    /// [`BRACE_LOOKAHEAD`] lines after it. Returns `None` for brace-less
    /// loops and for unbalanced braces.
    pub fn loop_span(&self, header: usize) -> Option<LoopSpan> {
        let first = self.line(header)?;
        if !first.contains('{') && first.trim_end().ends_with(';') {
            return None;
        }

        let open = (header..=header + BRACE_LOOKAHEAD)
            .take_while(|n| *n <= self.lines.len())
            .find(|n| self.line(*n).is_some_and(|l| l.contains('{')))?;

        let mut depth: i64 = 0;
        let mut opened = false;
        for number in open..=self.lines.len() {
            let line = self.line(number)?;
            for ch in line.chars() {
                match ch {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            if opened && depth <= 0 {
                return Some(LoopSpan {
                    start: header,
                    end: number,
                });
            }
        }
        None
    }

    /// Name of the nearest function-signature-shaped line at or above `line`
    pub fn enclosing_function(&self, line: usize) -> Option<String> {
        let last = line.min(self.lines.len());
        (1..=last)
            .rev()
            .filter_map(|n| self.line(n))
            .find_map(signature_name)
    }
}

pub fn is_loop_header(line: &str) -> bool {
    LOOP_HEADER.is_match(line.trim_start())
}

/// Number of loop keywords opening a loop on this line
pub fn loop_keyword_count(line: &str) -> usize {
    LOOP_KEYWORD.find_iter(line).count()
}

/// Identifiers in call position, control keywords excluded
pub fn call_names(text: &str) -> Vec<&str> {
    CALL_SHAPE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| !CONTROL_KEYWORDS.contains(name))
        .collect()
}

pub fn call_count(text: &str) -> usize {
    call_names(text).len()
}

/// Function name if `line` looks like the start of a definition
pub fn signature_name(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with('*') {
        return None;
    }
    let caps = SIGNATURE.captures(line)?;
    let prefix = caps.get(1)?.as_str();
    let first_word = prefix.split_whitespace().next().unwrap_or_default();
    if NON_TYPE_PREFIXES.contains(&first_word) {
        return None;
    }
    let name = caps.get(2)?.as_str();
    if CONTROL_KEYWORDS.contains(&name) || name == "else" {
        return None;
    }
    Some(name.to_string())
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const KERNEL: &str = indoc! {"
        #include <stdio.h>

        void vector_add(float *a, float *b, float *c, int n) {
            for (int i = 0; i < n; i++) {
                c[i] = a[i] + b[i];
            }
        }

        static int helper(int x)
        {
            int total = 0;
            while (x > 0)
            {
                total += x--;
            }
            return total;
        }
    "};

    #[test]
    fn test_loop_headers_found() {
        let text = SourceText::new(KERNEL);
        let headers: Vec<_> = text.loop_headers().collect();
        assert_eq!(headers, vec![4, 12]);
    }

    #[test]
    fn test_loop_span_same_line_brace() {
        let text = SourceText::new(KERNEL);
        assert_eq!(text.loop_span(4), Some(LoopSpan { start: 4, end: 6 }));
    }

    #[test]
    fn test_loop_span_brace_on_next_line() {
        let text = SourceText::new(KERNEL);
        assert_eq!(text.loop_span(12), Some(LoopSpan { start: 12, end: 15 }));
    }

    #[test]
    fn test_one_line_loop_span() {
        let text = SourceText::new("for(int i=0;i<n;i++){c[i]=a[i]+b[i];}");
        assert_eq!(text.loop_span(1), Some(LoopSpan { start: 1, end: 1 }));
    }

    #[test]
    fn test_unmatched_brace_is_skipped() {
        let text = SourceText::new("for (i = 0; i < n; i++) {\n  x[i] = 0;\n");
        assert_eq!(text.loop_span(1), None);
    }

    #[test]
    fn test_braceless_loop_is_skipped() {
        let text = SourceText::new("for (i = 0; i < n; i++) x[i] = 0;\nif (y) {\n}\n");
        assert_eq!(text.loop_span(1), None);
    }

    #[test]
    fn test_enclosing_function() {
        let text = SourceText::new(KERNEL);
        assert_eq!(text.enclosing_function(5).as_deref(), Some("vector_add"));
        assert_eq!(text.enclosing_function(14).as_deref(), Some("helper"));
        assert_eq!(text.enclosing_function(1), None);
    }

    #[test]
    fn test_signature_rejects_statements_and_control_flow() {
        assert_eq!(signature_name("    result = compute(a, b);"), None);
        assert_eq!(signature_name("    } else if (x > 0) {"), None);
        assert_eq!(signature_name("    return scale(x,"), None);
        assert_eq!(
            signature_name("double Matrix::trace(const Matrix& m) const {").as_deref(),
            Some("Matrix::trace")
        );
    }

    #[test]
    fn test_call_names_exclude_keywords() {
        let names = call_names("for (i = 0; i < n; i++) { if (f(x)) y = sqrt(z) + sizeof(int); }");
        assert_eq!(names, vec!["f", "sqrt"]);
    }

    #[test]
    fn test_context_clips_to_file() {
        let text = SourceText::new("a\nb\nc\nd");
        assert_eq!(text.context(1, 2), "a\nb\nc");
        assert_eq!(text.context(4, 1), "c\nd");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_loop_keyword_count() {
        assert_eq!(loop_keyword_count("for (i...) { for (j...) {"), 2);
        assert_eq!(loop_keyword_count("do {"), 1);
        assert_eq!(loop_keyword_count("x = format(y);"), 0);
    }
}

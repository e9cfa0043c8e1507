//! Memory usage heuristics.

use super::source::{self, compiled, LazyRegex};
use super::{metadata, AgentError, AgentOutput};
use crate::models::{AgentStatus, Finding, Language, Severity};
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

static RANGE_COMPREHENSION: LazyRegex =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\bfor\b[^\]]*\bin\s+range\s*\("));
static GLOBAL: LazyRegex = LazyLock::new(|| Regex::new(r"^\s*global\s+\w"));
static OPEN_CALL: LazyRegex = LazyLock::new(|| Regex::new(r"\bopen\s*\("));
static WITH_STATEMENT: LazyRegex = LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?with\b"));

pub fn analyze(code: &str, language: Language) -> Result<AgentOutput, AgentError> {
    if language != Language::Python {
        let findings = vec![Finding::new(
            "info",
            Severity::Info,
            format!("Memory profiling for {} coming soon", language.display_name()),
        )];
        let meta = summarize(&findings);
        return Ok(AgentOutput::success(findings, meta).with_status(AgentStatus::Partial));
    }

    let lines = source::masked_lines(code, language);
    let comprehension = compiled(&RANGE_COMPREHENSION)?;
    let global = compiled(&GLOBAL)?;
    let open_call = compiled(&OPEN_CALL)?;
    let with_statement = compiled(&WITH_STATEMENT)?;

    let mut findings = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;

        if comprehension.is_match(line) {
            findings.push(
                Finding::new(
                    "optimization",
                    Severity::Info,
                    "Consider using generators instead of list comprehensions for large datasets",
                )
                .at_line(lineno)
                .with_suggestion("Use (x for x in ...) instead of [x for x in ...]"),
            );
        }
        if global.is_match(line) {
            findings.push(
                Finding::new(
                    "memory_leak",
                    Severity::Warning,
                    "Global variables detected - may cause memory retention",
                )
                .at_line(lineno)
                .with_suggestion("Consider using local variables or class instances"),
            );
        }
        if open_call.is_match(line) && !with_statement.is_match(line) {
            findings.push(
                Finding::new(
                    "memory_leak",
                    Severity::Warning,
                    "File opened without context manager - may leak file handles",
                )
                .at_line(lineno)
                .with_suggestion("Use \"with open(...) as f:\" to ensure proper cleanup"),
            );
        }
    }

    let meta = summarize(&findings);
    Ok(AgentOutput::success(findings, meta))
}

fn summarize(findings: &[Finding]) -> crate::models::Metadata {
    let leaks = findings
        .iter()
        .filter(|f| f.severity == Some(Severity::Warning))
        .count();
    let optimizations = findings
        .iter()
        .filter(|f| f.category == "optimization")
        .count();
    metadata([
        ("potential_leaks", json!(leaks)),
        ("optimizations", json!(optimizations)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_patterns() {
        let code = "\
squares = [x * x for x in range(1000)]
def f():
    global cache
    fh = open('data.txt')
    with open('other.txt') as g:
        pass
";
        let output = analyze(code, Language::Python).unwrap();
        let lines: Vec<(&str, usize)> = output
            .findings
            .iter()
            .map(|f| (f.category.as_str(), f.line))
            .collect();
        assert_eq!(
            lines,
            vec![("optimization", 1), ("memory_leak", 3), ("memory_leak", 4)]
        );
        assert_eq!(output.metadata["potential_leaks"], json!(2));
        assert_eq!(output.metadata["optimizations"], json!(1));
        assert_eq!(output.status, AgentStatus::Success);
    }

    #[test]
    fn test_comment_mentions_are_ignored() {
        let output = analyze("# global state and open( calls\nx = 1", Language::Python).unwrap();
        assert!(output.findings.is_empty());
    }

    #[test]
    fn test_other_languages_are_partial() {
        let output = analyze("int main() {}", Language::Cpp).unwrap();
        assert_eq!(output.status, AgentStatus::Partial);
        assert_eq!(output.findings[0].message, "Memory profiling for C++ coming soon");
        assert_eq!(output.metadata["potential_leaks"], json!(0));
    }
}

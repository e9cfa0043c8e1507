//! Fix suggestions derived from other agents' findings.
//!
//! Only reads `all_findings`; an upstream agent that did not run, or
//! failed, simply contributes no suggestions.

use super::{metadata, AgentContext, AgentOutput};
use crate::models::{Finding, Severity};
use serde_json::{json, Value};

/// Agents whose results this agent reads.
pub const DEPENDENCIES: &[&str] = &["error_detector", "complexity_analyzer", "security_analyzer"];

pub fn analyze(context: &AgentContext) -> AgentOutput {
    let mut suggestions = Vec::new();

    if let Some(findings) = context.findings_of("error_detector") {
        suggestions.extend(error_fixes(findings));
    }
    if let Some(findings) = context.findings_of("complexity_analyzer") {
        suggestions.extend(optimizations(findings));
    }
    if let Some(findings) = context.findings_of("security_analyzer") {
        suggestions.extend(security_fixes(findings));
    }

    let auto_fixable = suggestions
        .iter()
        .filter(|s| s.extra.get("auto_fixable") == Some(&Value::Bool(true)))
        .count();
    let meta = metadata([
        ("total_suggestions", json!(suggestions.len())),
        ("auto_fixable", json!(auto_fixable)),
    ]);

    AgentOutput::success(suggestions, meta)
}

fn suggestion(fix_type: &str, severity: Severity, issue: &str, fix: &str, line: usize) -> Finding {
    Finding::new(fix_type, severity, issue)
        .at_line(line)
        .with_suggestion(fix)
        .with_field("issue", issue)
        .with_field("fix_type", fix_type)
        .with_field("auto_fixable", false)
}

fn error_fixes(findings: &[Finding]) -> impl Iterator<Item = Finding> + '_ {
    findings
        .iter()
        .filter(|f| f.category == "runtime" && f.message.contains("Division by zero"))
        .map(|f| {
            suggestion(
                "error_fix",
                Severity::High,
                "Division by zero",
                "Add zero check before division",
                f.line,
            )
            .with_field(
                "code_example",
                "if divisor != 0:\n    result = numerator / divisor",
            )
        })
}

fn optimizations(findings: &[Finding]) -> impl Iterator<Item = Finding> + '_ {
    findings
        .iter()
        .filter(|f| f.category == "time_complexity")
        .filter(|f| {
            f.field_str("big_o")
                .is_some_and(|o| o.contains("O(n²)") || o.contains("O(n^2)"))
        })
        .map(|f| {
            suggestion(
                "optimization",
                Severity::Medium,
                "Quadratic time complexity",
                "Consider using hash table for O(n) lookup",
                f.line,
            )
            .with_field("explanation", "Replace nested loops with hash-based approach")
        })
}

fn security_fixes(findings: &[Finding]) -> impl Iterator<Item = Finding> + '_ {
    findings
        .iter()
        .filter_map(|f| match f.field_str("vulnerability")? {
            "sql_injection" => Some(
                suggestion(
                    "security_fix",
                    Severity::Critical,
                    "SQL Injection vulnerability",
                    "Use parameterized queries",
                    f.line,
                )
                .with_field(
                    "code_example",
                    "cursor.execute(\"SELECT * FROM users WHERE id = ?\", (user_id,))",
                ),
            ),
            "hardcoded_secrets" => Some(
                suggestion(
                    "security_fix",
                    Severity::High,
                    "Hardcoded credentials",
                    "Use environment variables",
                    f.line,
                )
                .with_field("code_example", "password = os.environ.get(\"DB_PASSWORD\")"),
            ),
            _ => None,
        })
}

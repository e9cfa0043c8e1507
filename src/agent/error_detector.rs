//! Syntax, runtime and logical error detection.

use super::source::{self, compiled, Bracket, LazyRegex};
use super::{metadata, AgentError, AgentOutput};
use crate::models::{Finding, Language, Severity};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PY_BLOCK_KEYWORD: LazyRegex = LazyLock::new(|| {
    Regex::new(r"^\s*(if|elif|else|for|while|def|class|try|except|finally|with)\b")
});
static PY_DIVIDE_BY_ZERO: LazyRegex =
    LazyLock::new(|| Regex::new(r"[\w)\]]\s*/\s*(0+(?:\.0*)?)(?:[^\w.]|$)"));
static PY_WHILE_TRUE: LazyRegex =
    LazyLock::new(|| Regex::new(r"^\s*while\s*\(?\s*True\s*\)?\s*:"));
static PY_NONE_COMPARE: LazyRegex = LazyLock::new(|| Regex::new(r"[!=]=\s*None\b"));

static C_NEW: LazyRegex = LazyLock::new(|| Regex::new(r"\bnew\s"));
static C_NULL_DEREF: LazyRegex = LazyLock::new(|| Regex::new(r"\*\s*(NULL|nullptr)\b"));
static C_MISSING_SEMICOLON: LazyRegex =
    LazyLock::new(|| Regex::new(r"\b(return|break|continue)\s+[^;{}\s]+\s*$"));
static C_UNINITIALIZED: LazyRegex =
    LazyLock::new(|| Regex::new(r"\b(int|float|double|char|bool)\s+(\w+)\s*;"));

static JAVA_RESOURCE: LazyRegex = LazyLock::new(|| {
    Regex::new(r"new\s+(FileInputStream|FileOutputStream|BufferedReader|Scanner)\b")
});
static JAVA_TRY_WITH_RESOURCES: LazyRegex = LazyLock::new(|| Regex::new(r"\btry\s*\("));

const ALL_BRACKETS: [Bracket; 3] = [Bracket::Paren, Bracket::Brace, Bracket::Square];

pub fn analyze(code: &str, language: Language) -> Result<AgentOutput, AgentError> {
    let findings = match language {
        Language::Python => check_python(code)?,
        Language::Javascript | Language::Typescript => {
            bracket_findings(&source::masked_code(code, language), &ALL_BRACKETS)
        }
        Language::Cpp | Language::C => check_c_family(code, language)?,
        Language::Java => check_java(code)?,
        Language::Go | Language::Rust | Language::Ruby | Language::Php => {
            let mut findings = bracket_findings(&source::masked_code(code, language), &ALL_BRACKETS);
            if findings.is_empty() {
                findings.push(Finding::new(
                    "info",
                    Severity::Info,
                    format!("Basic syntax check passed for {}", language),
                ));
            }
            findings
        }
    };

    let count = |category: &str| findings.iter().filter(|f| f.category == category).count();
    let meta = metadata([
        ("total_errors", json!(findings.len())),
        ("syntax_errors", json!(count("syntax"))),
        ("runtime_errors", json!(count("runtime"))),
        ("logical_errors", json!(count("logical"))),
    ]);

    Ok(AgentOutput::success(findings, meta))
}

fn bracket_findings(masked: &str, kinds: &[Bracket]) -> Vec<Finding> {
    source::unbalanced(masked, kinds)
        .into_iter()
        .map(|kind| Finding::new("syntax", Severity::Error, kind.message()))
        .collect()
}

fn check_python(code: &str) -> Result<Vec<Finding>, AgentError> {
    let lines = source::masked_lines(code, Language::Python);

    let mut syntax = bracket_findings(&lines.join("\n"), &ALL_BRACKETS)
        .into_iter()
        .map(|f| {
            let message = format!("Syntax Error: {}", f.message.to_lowercase());
            Finding { message, ..f }
        })
        .collect::<Vec<_>>();

    let block_keyword = compiled(&PY_BLOCK_KEYWORD)?;
    let mut open = 0;
    let mut start = 0;
    for (idx, line) in lines.iter().enumerate() {
        if open == 0 {
            start = idx;
        }
        open = (open + source::bracket_delta(line)).max(0);

        // a header spanning several lines is judged on its last line
        if open > 0 || !block_keyword.is_match(&lines[start]) {
            continue;
        }
        if !line.contains(':') {
            syntax.push(
                Finding::new("syntax", Severity::Error, "Syntax Error: expected ':'")
                    .at_line(start + 1)
                    .with_field("text", code.lines().nth(start).unwrap_or_default().trim()),
            );
        }
    }

    // Later checks need a well-formed snippet
    if !syntax.is_empty() {
        return Ok(syntax);
    }

    let mut findings = Vec::new();
    let divide = compiled(&PY_DIVIDE_BY_ZERO)?;
    let while_true = compiled(&PY_WHILE_TRUE)?;
    let none_compare = compiled(&PY_NONE_COMPARE)?;

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;
        for _ in divide.find_iter(line) {
            findings.push(
                Finding::new("runtime", Severity::Error, "Division by zero detected")
                    .at_line(lineno)
                    .with_suggestion("Add zero check before division"),
            );
        }
    }

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;
        if while_true.is_match(line) {
            findings.push(
                Finding::new(
                    "logical",
                    Severity::Warning,
                    "Potential infinite loop detected (while True)",
                )
                .at_line(lineno)
                .with_suggestion("Ensure loop has proper exit condition"),
            );
        }
        for _ in none_compare.find_iter(line) {
            findings.push(
                Finding::new(
                    "logical",
                    Severity::Info,
                    "Use \"is None\" instead of \"== None\"",
                )
                .at_line(lineno)
                .with_suggestion("Replace == with is for None comparison"),
            );
        }
    }

    Ok(findings)
}

fn check_c_family(code: &str, language: Language) -> Result<Vec<Finding>, AgentError> {
    let lines = source::masked_lines(code, language);
    let masked = lines.join("\n");
    let mut findings = bracket_findings(&masked, &[Bracket::Paren, Bracket::Brace]);

    let new_alloc = compiled(&C_NEW)?;
    let null_deref = compiled(&C_NULL_DEREF)?;
    let missing_semicolon = compiled(&C_MISSING_SEMICOLON)?;
    let has_delete = masked.contains("delete");

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;

        if new_alloc.is_match(line) && !has_delete {
            findings.push(
                Finding::new(
                    "memory",
                    Severity::Warning,
                    "Memory allocation without visible delete - potential memory leak",
                )
                .at_line(lineno)
                .with_suggestion("Ensure memory is freed with delete or use smart pointers"),
            );
        }
        if null_deref.is_match(line) {
            findings.push(
                Finding::new("runtime", Severity::Error, "Potential null pointer dereference")
                    .at_line(lineno),
            );
        }
        if missing_semicolon.is_match(line.trim()) {
            findings.push(
                Finding::new("syntax", Severity::Warning, "Possible missing semicolon")
                    .at_line(lineno),
            );
        }
        if line.contains("using namespace std;") {
            findings.push(
                Finding::new(
                    "quality",
                    Severity::Info,
                    "Using namespace std pollutes global namespace",
                )
                .at_line(lineno)
                .with_suggestion("Consider using std:: prefix instead"),
            );
        }
    }

    let mut seen = BTreeSet::new();
    for caps in compiled(&C_UNINITIALIZED)?.captures_iter(&masked) {
        let (Some(decl), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if !seen.insert(name.as_str().to_string()) {
            continue;
        }
        let assigned = Regex::new(&format!(r"\b{}\s*=", regex::escape(name.as_str())))?;
        if !assigned.is_match(&masked) {
            findings.push(
                Finding::new(
                    "runtime",
                    Severity::Warning,
                    format!("Variable \"{}\" may be uninitialized", name.as_str()),
                )
                .at_line(source::line_of_offset(&masked, decl.start()))
                .with_suggestion("Initialize variables at declaration"),
            );
        }
    }

    if findings.is_empty() {
        findings.push(no_errors(language));
    }
    Ok(findings)
}

fn check_java(code: &str) -> Result<Vec<Finding>, AgentError> {
    let lines = source::masked_lines(code, Language::Java);
    let masked = lines.join("\n");
    let mut findings = bracket_findings(&masked, &[Bracket::Paren, Bracket::Brace]);

    let resource = compiled(&JAVA_RESOURCE)?;
    let closed = compiled(&JAVA_TRY_WITH_RESOURCES)?.is_match(&masked) || masked.contains(".close()");

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;
        if line.contains("== null") || line.contains("!= null") {
            findings.push(
                Finding::new(
                    "quality",
                    Severity::Info,
                    "Consider using Objects.isNull() or Objects.nonNull()",
                )
                .at_line(lineno),
            );
        }
        if resource.is_match(line) && !closed {
            findings.push(
                Finding::new("resource", Severity::Warning, "Resource may not be properly closed")
                    .at_line(lineno)
                    .with_suggestion("Use try-with-resources or ensure .close() is called"),
            );
        }
    }

    if findings.is_empty() {
        findings.push(no_errors(Language::Java));
    }
    Ok(findings)
}

fn no_errors(language: Language) -> Finding {
    Finding::new(
        "info",
        Severity::Info,
        format!("No obvious errors detected in {} code", language.display_name()),
    )
}

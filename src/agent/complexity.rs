//! Time complexity, cyclomatic complexity and code metric estimates.
//!
//! Python functions are delimited by indentation and get per-function
//! cyclomatic and Big-O findings plus whole-file Halstead and
//! maintainability index estimates. C-family and JavaScript code is
//! scanned for loop nesting through braces.

use super::source::{self, compiled, LazyRegex};
use super::{metadata, AgentError, AgentOutput};
use crate::models::{Finding, Language, Severity};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static PY_DEF: LazyRegex =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("));
static PY_LOOP: LazyRegex = LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?(?:for|while)\b"));
static PY_DECISION: LazyRegex =
    LazyLock::new(|| Regex::new(r"\b(?:if|elif|for|while|except|and|or)\b"));
static PY_TOKEN: LazyRegex = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z_]\w*|\d+(?:\.\d+)?|"[^"]*"|'[^']*'|[-+*/%=<>!&|^~@]+"#)
});

static C_FUNCTION: LazyRegex = LazyLock::new(|| {
    Regex::new(r"\b(?:void|int|float|double|char|bool|string|auto)\s+(\w+)\s*\([^)]*\)\s*\{")
});
static JAVA_METHOD: LazyRegex = LazyLock::new(|| {
    Regex::new(
        r"\b(?:public|private|protected)?\s*(?:static)?\s*(?:void|int|float|double|char|boolean|String|\w+)\s+(\w+)\s*\([^)]*\)\s*\{",
    )
});
static C_BRANCH: LazyRegex =
    LazyLock::new(|| Regex::new(r"\b(?:for|while|if)\s*\(|\bcase\s+"));
static JS_BRANCH: LazyRegex = LazyLock::new(|| Regex::new(r"\b(?:for|while|if)\s*\("));
static LOOP_TOKEN: LazyRegex =
    LazyLock::new(|| Regex::new(r"\b(?:for|while|do)\b|[{}();]"));
static NEW_ALLOC: LazyRegex = LazyLock::new(|| Regex::new(r"\bnew\s+"));
static MALLOC: LazyRegex = LazyLock::new(|| Regex::new(r"\bmalloc\s*\("));
static JS_ARROW: LazyRegex = LazyLock::new(|| Regex::new(r"=>"));
static JS_FUNCTION: LazyRegex = LazyLock::new(|| Regex::new(r"\bfunction\s+\w+"));
static GENERIC_LOOP: LazyRegex = LazyLock::new(|| Regex::new(r"\b(?:for|while)\b"));
static GENERIC_IF: LazyRegex = LazyLock::new(|| Regex::new(r"\bif\b"));

const CONTROL_KEYWORDS: [&str; 6] = ["if", "for", "while", "switch", "catch", "return"];

const PY_OPERATOR_KEYWORDS: [&str; 5] = ["and", "or", "not", "in", "is"];

const PY_KEYWORDS: [&str; 30] = [
    "False", "None", "True", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "lambda", "nonlocal", "pass", "raise", "return", "try", "while", "with", "yield",
];

pub fn analyze(code: &str, language: Language) -> Result<AgentOutput, AgentError> {
    let findings = match language {
        Language::Python => analyze_python(code)?,
        Language::Cpp | Language::C | Language::Java => analyze_c_family(code, language)?,
        Language::Javascript | Language::Typescript => analyze_javascript(code, language)?,
        Language::Go | Language::Rust | Language::Ruby | Language::Php => {
            analyze_generic(code, language)?
        }
    };

    let meta = summarize(&findings);
    Ok(AgentOutput::success(findings, meta))
}

/// Big-O estimate for a function or snippet.
#[derive(Debug, Clone, PartialEq)]
struct BigO {
    notation: String,
    /// Ordering key, higher is worse.
    rank: u32,
    severity: Severity,
    explanation: String,
}

impl BigO {
    fn recursive() -> Self {
        Self {
            notation: "O(2^n)".to_string(),
            rank: u32::MAX,
            severity: Severity::Warning,
            explanation: "Recursive function detected - may have exponential complexity"
                .to_string(),
        }
    }

    fn from_loop_depth(depth: u32) -> Self {
        let (notation, severity, explanation) = match depth {
            0 => (
                "O(1)".to_string(),
                Severity::Info,
                "Constant time - no loops detected".to_string(),
            ),
            1 => (
                "O(n)".to_string(),
                Severity::Info,
                "Linear time - single loop".to_string(),
            ),
            2 => (
                "O(n²)".to_string(),
                Severity::Warning,
                "Quadratic time - nested loops".to_string(),
            ),
            3 => (
                "O(n³)".to_string(),
                Severity::Error,
                "Cubic time - deeply nested loops".to_string(),
            ),
            k => (
                format!("O(n^{})", k),
                Severity::Error,
                format!("Polynomial time with {} nested loops", k),
            ),
        };
        Self {
            notation,
            rank: depth,
            severity,
            explanation,
        }
    }

    fn finding(&self, function: &str, line: usize, message: String) -> Finding {
        Finding::new("time_complexity", self.severity, message)
            .at_line(line)
            .with_field("function", function)
            .with_field("big_o", self.notation.as_str())
            .with_field("rank", self.rank)
            .with_field("explanation", self.explanation.as_str())
    }
}

fn analyze_python(code: &str) -> Result<Vec<Finding>, AgentError> {
    let lines = source::masked_lines(code, Language::Python);
    let def = compiled(&PY_DEF)?;
    let loop_header = compiled(&PY_LOOP)?;
    let decision = compiled(&PY_DECISION)?;

    let mut cyclomatic = Vec::new();
    let mut time = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = def.captures(line) else {
            continue;
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let block = source::block_at(&lines, idx);

        let body: Vec<&String> = block.body(&lines).map(|(_, l)| l).collect();
        let complexity = 1 + body.iter().map(|l| decision.find_iter(l).count()).sum::<usize>();
        let severity = match complexity {
            0..=5 => Severity::Info,
            6..=10 => Severity::Warning,
            _ => Severity::Error,
        };
        let mut finding = Finding::new(
            "cyclomatic_complexity",
            severity,
            format!("{} has cyclomatic complexity of {}", name, complexity),
        )
        .at_line(block.line())
        .with_field("name", name)
        .with_field("complexity", complexity);
        if complexity > 10 {
            finding = finding.with_suggestion("Consider breaking down into smaller functions");
        }
        cyclomatic.push(finding);

        let calls_itself = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name)))?;
        let big_o = if body.iter().any(|l| calls_itself.is_match(l)) {
            BigO::recursive()
        } else {
            BigO::from_loop_depth(python_loop_depth(&body, loop_header))
        };
        time.push(big_o.finding(
            name,
            block.line(),
            format!("{} has time complexity {}", name, big_o.notation),
        ));
    }

    let mut findings = cyclomatic;

    let sloc = lines.iter().filter(|l| !l.trim().is_empty()).count();
    let module_complexity = 1 + lines
        .iter()
        .map(|l| decision.find_iter(l).count())
        .sum::<usize>();
    let halstead = Halstead::measure(&lines, compiled(&PY_TOKEN)?);

    let mi = maintainability_index(halstead.volume(), module_complexity, sloc);
    let severity = if mi >= 70.0 {
        Severity::Info
    } else if mi >= 50.0 {
        Severity::Warning
    } else {
        Severity::Error
    };
    findings.push(
        Finding::new(
            "maintainability",
            severity,
            format!("Maintainability Index: {:.2}/100", mi),
        )
        .with_field("metric", "Maintainability Index")
        .with_field("score", round2(mi))
        .with_field("interpretation", interpret_mi(mi)),
    );

    findings.push(
        Finding::new(
            "halstead",
            Severity::Info,
            format!("Estimated bugs: {:.2}", halstead.bugs()),
        )
        .with_field("metrics", halstead.to_json()),
    );

    findings.extend(time);
    Ok(findings)
}

/// Deepest loop nesting within a function body, by indentation.
fn python_loop_depth(body: &[&String], loop_header: &Regex) -> u32 {
    let mut open: Vec<usize> = Vec::new();
    let mut max_depth = 0;

    for line in body {
        let indent = source::indent_of(line);
        while open.last().is_some_and(|&top| indent <= top) {
            open.pop();
        }
        if loop_header.is_match(line) {
            open.push(indent);
            max_depth = max_depth.max(open.len() as u32);
        }
    }
    max_depth
}

/// Deepest loop nesting in brace-delimited code.
fn brace_loop_depth(masked: &str, tokens: &Regex) -> u32 {
    // loops opened by each enclosing brace
    let mut frames: Vec<u32> = Vec::new();
    let mut pending = 0;
    let mut parens = 0usize;
    let mut max_depth = 0;

    for token in tokens.find_iter(masked) {
        match token.as_str() {
            "(" => parens += 1,
            ")" => parens = parens.saturating_sub(1),
            "{" => {
                frames.push(pending);
                pending = 0;
                max_depth = max_depth.max(frames.iter().sum());
            }
            "}" => {
                frames.pop();
            }
            ";" if parens == 0 => {
                // loop body was a single statement
                max_depth = max_depth.max(frames.iter().sum::<u32>() + pending);
                pending = 0;
            }
            ";" => {}
            _ if parens == 0 => pending += 1,
            _ => {}
        }
    }
    max_depth
}

fn analyze_c_family(code: &str, language: Language) -> Result<Vec<Finding>, AgentError> {
    let masked = source::masked_code(code, language);
    let function_pattern = if language == Language::Java {
        compiled(&JAVA_METHOD)?
    } else {
        compiled(&C_FUNCTION)?
    };
    let functions: Vec<&str> = function_pattern
        .captures_iter(&masked)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|name| !CONTROL_KEYWORDS.contains(name))
        .collect();

    let complexity = 1 + compiled(&C_BRANCH)?.find_iter(&masked).count();
    let severity = match complexity {
        0..=10 => Severity::Info,
        11..=20 => Severity::Warning,
        _ => Severity::Error,
    };
    let mut overall = Finding::new(
        "cyclomatic_complexity",
        severity,
        format!("Estimated cyclomatic complexity: {}", complexity),
    )
    .at_line(1)
    .with_field("name", "Overall")
    .with_field("complexity", complexity);
    if complexity > 20 {
        overall = overall.with_suggestion("Consider refactoring if complexity exceeds 20");
    }

    let mut findings = vec![overall];

    let big_o = BigO::from_loop_depth(brace_loop_depth(&masked, compiled(&LOOP_TOKEN)?));
    findings.push(big_o.finding(
        "main",
        1,
        format!("Estimated time complexity: {}", big_o.notation),
    ));

    let news = compiled(&NEW_ALLOC)?.find_iter(&masked).count();
    let mallocs = compiled(&MALLOC)?.find_iter(&masked).count();
    if news + mallocs > 0 {
        findings.push(
            Finding::new(
                "memory",
                Severity::Info,
                format!(
                    "Dynamic allocations: {} (new: {}, malloc: {})",
                    news + mallocs,
                    news,
                    mallocs
                ),
            )
            .with_suggestion("Ensure proper deallocation to prevent memory leaks"),
        );
    }

    findings.push(
        Finding::new(
            "structure",
            Severity::Info,
            format!("Functions detected: {}", functions.len()),
        )
        .with_field("functions", functions.iter().take(10).copied().collect::<Vec<_>>()),
    );

    Ok(findings)
}

fn analyze_javascript(code: &str, language: Language) -> Result<Vec<Finding>, AgentError> {
    let masked = source::masked_code(code, language);

    let complexity = 1 + compiled(&JS_BRANCH)?.find_iter(&masked).count();
    let severity = if complexity <= 10 {
        Severity::Info
    } else {
        Severity::Warning
    };
    let mut findings = vec![Finding::new(
        "cyclomatic_complexity",
        severity,
        format!("Cyclomatic complexity: {}", complexity),
    )
    .at_line(1)
    .with_field("name", "Overall")
    .with_field("complexity", complexity)];

    let big_o = BigO::from_loop_depth(brace_loop_depth(&masked, compiled(&LOOP_TOKEN)?));
    findings.push(big_o.finding(
        "module",
        1,
        format!("Estimated time complexity: {}", big_o.notation),
    ));

    let declared = compiled(&JS_FUNCTION)?.find_iter(&masked).count();
    let arrows = compiled(&JS_ARROW)?.find_iter(&masked).count();
    findings.push(Finding::new(
        "structure",
        Severity::Info,
        format!(
            "Functions: {} declared, {} arrow functions",
            declared, arrows
        ),
    ));

    Ok(findings)
}

fn analyze_generic(code: &str, language: Language) -> Result<Vec<Finding>, AgentError> {
    let masked = source::masked_code(code, language);
    let loops = compiled(&GENERIC_LOOP)?.find_iter(&masked).count();
    let conditions = compiled(&GENERIC_IF)?.find_iter(&masked).count();
    let complexity = 1 + loops + conditions;

    Ok(vec![
        Finding::new(
            "cyclomatic_complexity",
            Severity::Info,
            format!("Estimated complexity for {}: {}", language, complexity),
        )
        .at_line(1)
        .with_field("name", "Estimated")
        .with_field("complexity", complexity),
        Finding::new(
            "structure",
            Severity::Info,
            format!(
                "Lines of code: {}, Loops: {}, Conditions: {}",
                code.lines().count().max(1),
                loops,
                conditions
            ),
        ),
    ])
}

/// Halstead operator/operand counts over a token scan.
#[derive(Debug, Default)]
struct Halstead {
    distinct_operators: usize,
    distinct_operands: usize,
    total_operators: usize,
    total_operands: usize,
}

impl Halstead {
    fn measure(lines: &[String], token: &Regex) -> Self {
        let mut operators = HashSet::new();
        let mut operands = HashSet::new();
        let mut counts = Halstead::default();

        for line in lines {
            for tok in token.find_iter(line).map(|m| m.as_str()) {
                let starts_word = tok.starts_with(|c: char| c.is_alphabetic() || c == '_');
                if !starts_word && !tok.starts_with(|c: char| c.is_ascii_digit() || c == '"' || c == '\'') {
                    counts.total_operators += 1;
                    operators.insert(tok);
                } else if PY_OPERATOR_KEYWORDS.contains(&tok) {
                    counts.total_operators += 1;
                    operators.insert(tok);
                } else if !(starts_word && PY_KEYWORDS.contains(&tok)) {
                    counts.total_operands += 1;
                    operands.insert(tok);
                }
            }
        }

        counts.distinct_operators = operators.len();
        counts.distinct_operands = operands.len();
        counts
    }

    fn vocabulary(&self) -> usize {
        self.distinct_operators + self.distinct_operands
    }

    fn length(&self) -> usize {
        self.total_operators + self.total_operands
    }

    fn volume(&self) -> f64 {
        match self.vocabulary() {
            0 => 0.0,
            v => self.length() as f64 * (v as f64).log2(),
        }
    }

    fn difficulty(&self) -> f64 {
        match self.distinct_operands {
            0 => 0.0,
            n => (self.distinct_operators as f64 / 2.0) * (self.total_operands as f64 / n as f64),
        }
    }

    fn bugs(&self) -> f64 {
        self.volume() / 3000.0
    }

    fn to_json(&self) -> Value {
        let effort = self.difficulty() * self.volume();
        json!({
            "vocabulary": self.vocabulary(),
            "length": self.length(),
            "difficulty": round2(self.difficulty()),
            "effort": round2(effort),
            "time": round2(effort / 18.0),
            "bugs": round2(self.bugs()),
        })
    }
}

/// Maintainability index normalized to 0..=100.
fn maintainability_index(volume: f64, complexity: usize, sloc: usize) -> f64 {
    if sloc == 0 || volume <= 0.0 {
        return 100.0;
    }
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * complexity as f64 - 16.2 * (sloc as f64).ln();
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}

fn interpret_mi(score: f64) -> &'static str {
    if score >= 70.0 {
        "Excellent - Easy to maintain"
    } else if score >= 50.0 {
        "Good - Moderately maintainable"
    } else if score >= 30.0 {
        "Poor - Difficult to maintain"
    } else {
        "Critical - Very difficult to maintain"
    }
}

fn summarize(findings: &[Finding]) -> crate::models::Metadata {
    let cyclomatic: Vec<u64> = findings
        .iter()
        .filter(|f| f.category == "cyclomatic_complexity")
        .filter_map(|f| f.extra.get("complexity").and_then(Value::as_u64))
        .collect();
    let (avg, max) = match cyclomatic.iter().max() {
        Some(&max) => (
            round2(cyclomatic.iter().sum::<u64>() as f64 / cyclomatic.len() as f64),
            max,
        ),
        None => (0.0, 0),
    };

    let mi = findings
        .iter()
        .filter(|f| f.category == "maintainability")
        .filter_map(|f| f.extra.get("score").and_then(Value::as_f64))
        .last()
        .unwrap_or(0.0);

    let dominant = findings
        .iter()
        .filter(|f| f.category == "time_complexity")
        .filter_map(|f| Some((f.extra.get("rank")?.as_u64()?, f.field_str("big_o")?)))
        .max_by_key(|(rank, _)| *rank)
        .map_or("Unknown", |(_, notation)| notation);

    metadata([
        ("avg_cyclomatic", json!(avg)),
        ("max_cyclomatic", json!(max)),
        ("maintainability_index", json!(mi)),
        ("dominant_complexity", json!(dominant)),
    ])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

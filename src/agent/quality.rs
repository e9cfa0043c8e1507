//! Code smells, best practices and the quality score.

use super::source::{self, compiled, Block, LazyRegex};
use super::{metadata, AgentError, AgentOutput};
use crate::models::{Finding, Language, Severity};
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

static PY_DEF: LazyRegex =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("));
static PY_CLASS: LazyRegex = LazyLock::new(|| Regex::new(r"^\s*class\s+([A-Za-z_]\w*)"));
static PY_CONTROL: LazyRegex = LazyLock::new(|| Regex::new(r"^\s*(?:if|elif|for|while)\b"));
static PY_DOCSTRING: LazyRegex = LazyLock::new(|| Regex::new(r#"^\s*[rRuUbB]{0,2}["']"#));
static SNAKE_CASE: LazyRegex = LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$"));
static PASCAL_CASE: LazyRegex = LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$"));

static JS_VAR: LazyRegex = LazyLock::new(|| Regex::new(r"\bvar\s+"));
static JS_CONSOLE_LOG: LazyRegex = LazyLock::new(|| Regex::new(r"console\.log"));

const MAX_FUNCTION_LINES: usize = 50;
const MAX_PARAMETERS: usize = 5;
const MAX_NESTING: usize = 3;
const MAX_CONSOLE_LOGS: usize = 3;

pub fn analyze(code: &str, language: Language) -> Result<AgentOutput, AgentError> {
    let findings = match language {
        Language::Python => check_python(code)?,
        Language::Javascript | Language::Typescript => check_javascript(code, language)?,
        _ => Vec::new(),
    };

    let count = |category: &str| findings.iter().filter(|f| f.category == category).count();
    let meta = metadata([
        ("quality_score", json!(quality_score(&findings))),
        ("total_issues", json!(findings.len())),
        ("code_smells", json!(count("code_smell"))),
        ("best_practices", json!(count("best_practice"))),
    ]);

    Ok(AgentOutput::success(findings, meta))
}

/// 100 minus 10 per error, 5 per warning and 2 per info, clamped to 0..=100.
pub fn quality_score(findings: &[Finding]) -> i64 {
    let penalty: i64 = findings
        .iter()
        .map(|f| match f.severity {
            Some(Severity::Error) => 10,
            Some(Severity::Warning) => 5,
            Some(Severity::Info) | None => 2,
            _ => 0,
        })
        .sum();
    (100 - penalty).clamp(0, 100)
}

fn check_python(code: &str) -> Result<Vec<Finding>, AgentError> {
    let lines = source::masked_lines(code, Language::Python);
    let def = compiled(&PY_DEF)?;
    let docstring = compiled(&PY_DOCSTRING)?;
    let snake_case = compiled(&SNAKE_CASE)?;

    let mut findings = Vec::new();
    let mut naming = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(name) = def.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()) else {
            continue;
        };
        let block = source::block_at(&lines, idx);

        let length = block.last - block.header;
        if length > MAX_FUNCTION_LINES {
            findings.push(
                Finding::new(
                    "code_smell",
                    Severity::Warning,
                    format!("Function \"{}\" is too long ({} lines)", name, length),
                )
                .at_line(block.line())
                .with_suggestion("Break down into smaller functions")
                .with_field("smell_type", "long_function"),
            );
        }

        let params = parameter_count(&lines, &block);
        if params > MAX_PARAMETERS {
            findings.push(
                Finding::new(
                    "code_smell",
                    Severity::Warning,
                    format!("Function \"{}\" has {} parameters", name, params),
                )
                .at_line(block.line())
                .with_suggestion("Consider using a config object or class")
                .with_field("smell_type", "too_many_parameters"),
            );
        }

        let has_docstring = first_statement(&lines, &block).is_some_and(|l| docstring.is_match(l));
        if !has_docstring {
            findings.push(
                Finding::new(
                    "best_practice",
                    Severity::Info,
                    format!("Function \"{}\" missing docstring", name),
                )
                .at_line(block.line())
                .with_suggestion("Add docstring to document function purpose"),
            );
        }

        if !snake_case.is_match(name) {
            naming.push(
                Finding::new(
                    "best_practice",
                    Severity::Info,
                    format!("Function \"{}\" should use snake_case", name),
                )
                .at_line(block.line())
                .with_suggestion("Use lowercase with underscores"),
            );
        }
    }

    findings.extend(deep_nesting(&lines, compiled(&PY_CONTROL)?));

    let class = compiled(&PY_CLASS)?;
    let pascal_case = compiled(&PASCAL_CASE)?;
    for (idx, line) in lines.iter().enumerate() {
        let Some(name) = class.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()) else {
            continue;
        };
        if !pascal_case.is_match(name) {
            naming.push(
                Finding::new(
                    "best_practice",
                    Severity::Info,
                    format!("Class \"{}\" should use PascalCase", name),
                )
                .at_line(idx + 1)
                .with_suggestion("Start with uppercase letter"),
            );
        }
    }
    naming.sort_by_key(|f| f.line);

    findings.extend(naming);
    Ok(findings)
}

/// Positional parameters of a `def`, `self` included.
fn parameter_count(lines: &[String], block: &Block) -> usize {
    let mut signature = String::new();
    let mut depth = 0;
    for line in &lines[block.header..=block.last] {
        signature.push_str(line);
        signature.push(' ');
        depth += source::bracket_delta(line);
        if depth <= 0 {
            break;
        }
    }

    let Some(open) = signature.find('(') else {
        return 0;
    };

    let mut count = 0;
    let mut current = String::new();
    let mut nesting = 0;
    for c in signature[open + 1..].chars() {
        match c {
            '(' | '[' | '{' => nesting += 1,
            ')' if nesting == 0 => break,
            ')' | ']' | '}' => nesting -= 1,
            ',' if nesting == 0 => {
                match classify(&current) {
                    Param::Positional => count += 1,
                    Param::Marker => {}
                    Param::StarArgs => return count,
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    match classify(&current) {
        Param::Positional => count + 1,
        _ => count,
    }
}

enum Param {
    Positional,
    /// `/` separator or an empty trailing slot.
    Marker,
    /// `*`, `*args` or `**kwargs`; nothing after it is positional.
    StarArgs,
}

fn classify(param: &str) -> Param {
    let param = param.trim();
    if param.is_empty() || param == "/" {
        Param::Marker
    } else if param.starts_with('*') {
        Param::StarArgs
    } else {
        Param::Positional
    }
}

/// First non-blank line after the signature of a function.
fn first_statement<'a>(lines: &'a [String], block: &Block) -> Option<&'a str> {
    let mut depth = 0;
    let mut body_start = block.header + 1;
    for (idx, line) in lines.iter().enumerate().take(block.last + 1).skip(block.header) {
        depth += source::bracket_delta(line);
        if depth <= 0 {
            body_start = idx + 1;
            break;
        }
    }
    lines
        .iter()
        .take(block.last + 1)
        .skip(body_start)
        .map(String::as_str)
        .find(|l| !l.trim().is_empty())
}

/// Control statements with more than `MAX_NESTING` levels of control flow
/// nested below them.
fn deep_nesting(lines: &[String], control: &Regex) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !control.is_match(line) {
            continue;
        }
        let block = source::block_at(lines, idx);
        let mut open: Vec<usize> = Vec::new();
        let mut depth = 0;
        for (_, inner) in block.body(lines) {
            let indent = source::indent_of(inner);
            while open.last().is_some_and(|&top| indent <= top) {
                open.pop();
            }
            if control.is_match(inner) {
                open.push(indent);
                depth = depth.max(open.len());
            }
        }
        if depth > MAX_NESTING {
            findings.push(
                Finding::new(
                    "code_smell",
                    Severity::Warning,
                    format!("Deep nesting detected (depth: {})", depth),
                )
                .at_line(idx + 1)
                .with_suggestion("Extract nested logic into separate functions")
                .with_field("smell_type", "deep_nesting"),
            );
        }
    }
    findings
}

fn check_javascript(code: &str, language: Language) -> Result<Vec<Finding>, AgentError> {
    let masked = source::masked_code(code, language);
    let mut findings = Vec::new();

    if let Some(m) = compiled(&JS_VAR)?.find(&masked) {
        findings.push(
            Finding::new("best_practice", Severity::Info, "Use let/const instead of var")
                .at_line(source::line_of_offset(&masked, m.start()))
                .with_suggestion("Replace var with let or const"),
        );
    }

    let logs = compiled(&JS_CONSOLE_LOG)?.find_iter(&masked).count();
    if logs > MAX_CONSOLE_LOGS {
        findings.push(
            Finding::new(
                "code_smell",
                Severity::Info,
                format!("Multiple console.log statements ({})", logs),
            )
            .with_suggestion("Remove console.log or use proper logging"),
        );
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(output: &AgentOutput) -> Vec<&str> {
        output.findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_score_formula() {
        let findings = vec![
            Finding::new("a", Severity::Error, "e"),
            Finding::new("a", Severity::Warning, "w"),
            Finding::new("a", Severity::Info, "i"),
            Finding::new("a", Severity::Critical, "ignored"),
        ];
        assert_eq!(quality_score(&findings), 83);

        let many: Vec<_> = (0..20)
            .map(|_| Finding::new("a", Severity::Error, "e"))
            .collect();
        assert_eq!(quality_score(&many), 0);
        assert_eq!(quality_score(&[]), 100);
    }

    #[test]
    fn test_documented_function_is_clean() {
        let code = "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n";
        let output = analyze(code, Language::Python).unwrap();
        assert!(output.findings.is_empty(), "{:?}", messages(&output));
        assert_eq!(output.metadata["quality_score"], json!(100));
    }

    #[test]
    fn test_python_smells() {
        let code = "\
def processData(a, b, c, d, e, f, *rest, key=None):
    return a

class my_class:
    pass
";
        let output = analyze(code, Language::Python).unwrap();
        assert_eq!(
            messages(&output),
            vec![
                "Function \"processData\" has 6 parameters",
                "Function \"processData\" missing docstring",
                "Function \"processData\" should use snake_case",
                "Class \"my_class\" should use PascalCase",
            ]
        );
        // one warning, three infos
        assert_eq!(output.metadata["quality_score"], json!(89));
        assert_eq!(output.metadata["code_smells"], json!(1));
        assert_eq!(output.metadata["best_practices"], json!(3));
    }

    #[test]
    fn test_long_function() {
        let mut code = String::from("def long_one():\n    \"\"\"Doc.\"\"\"\n");
        for i in 0..55 {
            code.push_str(&format!("    x{} = {}\n", i, i));
        }
        let output = analyze(&code, Language::Python).unwrap();
        assert_eq!(messages(&output), vec!["Function \"long_one\" is too long (56 lines)"]);
    }

    #[test]
    fn test_deep_nesting() {
        let code = "\
for a in x:
    for b in a:
        if b:
            while b:
                if c:
                    pass
";
        let output = analyze(code, Language::Python).unwrap();
        let nesting: Vec<_> = output
            .findings
            .iter()
            .filter(|f| f.field_str("smell_type") == Some("deep_nesting"))
            .collect();
        assert_eq!(nesting.len(), 1);
        assert_eq!(nesting[0].line, 1);
        assert_eq!(nesting[0].message, "Deep nesting detected (depth: 4)");
    }

    #[test]
    fn test_javascript_checks() {
        let code = "var a = 1;\nconsole.log(a);\nconsole.log(a);\nconsole.log(a);\nconsole.log(a);";
        let output = analyze(code, Language::Javascript).unwrap();
        assert_eq!(
            messages(&output),
            vec!["Use let/const instead of var", "Multiple console.log statements (4)"]
        );
        assert_eq!(output.metadata["quality_score"], json!(96));
    }

    #[test]
    fn test_other_languages_score_full() {
        let output = analyze("fn main() {}", Language::Rust).unwrap();
        assert!(output.findings.is_empty());
        assert_eq!(output.metadata["quality_score"], json!(100));
    }
}

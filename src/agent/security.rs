//! Pattern based vulnerability scanner.
//!
//! Runs on the raw source: secrets and injected SQL live inside string
//! literals, so nothing is masked here.

use super::source::line_of_offset;
use super::{metadata, AgentError, AgentOutput};
use crate::models::{Finding, Severity};
use regex::Regex;
use serde_json::json;
use std::fmt;
use std::sync::LazyLock;

/// Vulnerability classes the scanner knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vulnerability {
    SqlInjection,
    CommandInjection,
    HardcodedSecrets,
    Xss,
    InsecureRandom,
}

impl Vulnerability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vulnerability::SqlInjection => "sql_injection",
            Vulnerability::CommandInjection => "command_injection",
            Vulnerability::HardcodedSecrets => "hardcoded_secrets",
            Vulnerability::Xss => "xss",
            Vulnerability::InsecureRandom => "insecure_random",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Vulnerability::SqlInjection | Vulnerability::CommandInjection => Severity::Critical,
            Vulnerability::HardcodedSecrets | Vulnerability::Xss => Severity::High,
            Vulnerability::InsecureRandom => Severity::Medium,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Vulnerability::SqlInjection => "Potential SQL injection vulnerability detected",
            Vulnerability::CommandInjection => "Command injection vulnerability detected",
            Vulnerability::HardcodedSecrets => "Hardcoded credential detected",
            Vulnerability::Xss => "Potential XSS vulnerability detected",
            Vulnerability::InsecureRandom => "Insecure random number generation",
        }
    }

    fn recommendation(&self) -> &'static str {
        match self {
            Vulnerability::SqlInjection => {
                "Use parameterized queries or ORM instead of string formatting"
            }
            Vulnerability::CommandInjection => {
                "Avoid shell=True, use subprocess with list arguments"
            }
            Vulnerability::HardcodedSecrets => {
                "Use environment variables or secret management systems"
            }
            Vulnerability::Xss => "Sanitize user input and use textContent instead of innerHTML",
            Vulnerability::InsecureRandom => "Use secrets module for cryptographic operations",
        }
    }
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PATTERNS: &[(Vulnerability, &[&str])] = &[
    (
        Vulnerability::SqlInjection,
        &[
            r#"execute\s*\(\s*["'].*%s.*["']\s*%"#,
            r"\.format\s*\(.*\).*execute",
            r#"f".*\{.*\}.*".*execute"#,
        ],
    ),
    (
        Vulnerability::CommandInjection,
        &[
            r"os\.system\s*\(",
            r"subprocess\.(?:call|run|Popen).*shell\s*=\s*True",
        ],
    ),
    (
        Vulnerability::HardcodedSecrets,
        &[
            r#"password\s*=\s*["'].*["']"#,
            r#"api_key\s*=\s*["'].*["']"#,
            r#"secret\s*=\s*["'].*["']"#,
            r#"token\s*=\s*["'].*["']"#,
        ],
    ),
    (
        Vulnerability::Xss,
        &[r"innerHTML\s*=", r"document\.write\s*\("],
    ),
    (
        Vulnerability::InsecureRandom,
        &[r"random\.random\(\)", r"Math\.random\(\)"],
    ),
];

type Rules = Vec<(Vulnerability, Regex)>;

static RULES: LazyLock<Result<Rules, regex::Error>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .flat_map(|(vuln, patterns)| patterns.iter().map(move |p| (*vuln, p)))
        .map(|(vuln, pattern)| Regex::new(&format!("(?i){}", pattern)).map(|re| (vuln, re)))
        .collect()
});

pub fn analyze(code: &str) -> Result<AgentOutput, AgentError> {
    let rules = RULES
        .as_ref()
        .map_err(|e| AgentError::Pattern(e.clone()))?;

    let mut findings = Vec::new();
    for (vuln, regex) in rules {
        for m in regex.find_iter(code) {
            findings.push(
                Finding::new("security", vuln.severity(), vuln.message())
                    .at_line(line_of_offset(code, m.start()))
                    .with_suggestion(vuln.recommendation())
                    .with_field("vulnerability", vuln.as_str())
                    .with_field("code_snippet", m.as_str().trim())
                    .with_field("recommendation", vuln.recommendation()),
            );
        }
    }

    let count = |severity: Severity| {
        findings
            .iter()
            .filter(|f| f.severity == Some(severity))
            .count()
    };
    let meta = metadata([
        ("total_vulnerabilities", json!(findings.len())),
        ("critical", json!(count(Severity::Critical))),
        ("high", json!(count(Severity::High))),
        ("medium", json!(count(Severity::Medium))),
        ("low", json!(count(Severity::Low))),
    ]);

    Ok(AgentOutput::success(findings, meta))
}

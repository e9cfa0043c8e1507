//! Data models for the analysis orchestrator.
//!
//! This module contains the core data structures shared by the agents,
//! the scheduler, the aggregator and the report renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Free-form JSON object used for agent metadata and request context.
pub type Metadata = Map<String, Value>;

/// Per-run result map, keyed by agent name.
pub type ResultMap = BTreeMap<String, AgentResult>;

/// Programming languages accepted by the orchestrator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Cpp,
    C,
    Go,
    Rust,
    Ruby,
    Php,
}

impl Language {
    /// Every supported language, in the order they are advertised.
    pub const ALL: [Language; 10] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Go,
        Language::Rust,
        Language::Ruby,
        Language::Php,
    ];

    /// Wire identifier of the language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Javascript => "JavaScript",
            Language::Typescript => "TypeScript",
            Language::Java => "Java",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
        }
    }

    /// Guess the language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyw" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::Javascript),
            "ts" | "tsx" => Some(Language::Typescript),
            "java" => Some(Language::Java),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Language::Cpp),
            "c" | "h" => Some(Language::C),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    /// Whether `'` delimits single characters rather than strings.
    pub fn has_char_literals(&self) -> bool {
        matches!(
            self,
            Language::Java | Language::Cpp | Language::C | Language::Go | Language::Rust
        )
    }

    /// Whether `#` starts a line comment.
    pub fn hash_comments(&self) -> bool {
        matches!(self, Language::Python | Language::Ruby | Language::Php)
    }

    /// Whether `//` starts a line comment.
    pub fn slash_comments(&self) -> bool {
        !matches!(self, Language::Python | Language::Ruby)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a language identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == wanted)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Severity attached to a finding.
///
/// Agents use the first four grades; the security scanner also grades
/// vulnerabilities as high / medium / low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    Warning,
    High,
    Error,
    Critical,
}

/// Report bucket a severity counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityBucket {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Bucket used by the report summary. Only `critical` and `error`
    /// count as critical issues and only `warning` as a warning.
    pub fn bucket(&self) -> SeverityBucket {
        match self {
            Severity::Critical | Severity::Error => SeverityBucket::Critical,
            Severity::Warning => SeverityBucket::Warning,
            _ => SeverityBucket::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self.bucket() {
            SeverityBucket::Critical => "🔴",
            SeverityBucket::Warning => "🟡",
            SeverityBucket::Info => "🔵",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue or observation reported by an agent.
///
/// Only `category` and `severity` are relied upon downstream; agents attach
/// anything else they know (`vulnerability`, `big_o`, ...) to `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// 1-indexed line, 0 when the finding is not tied to a line.
    #[serde(default)]
    pub line: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Finding {
    pub fn new(category: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            severity: Some(severity),
            line: 0,
            message: message.into(),
            suggestion: None,
            extra: Metadata::new(),
        }
    }

    /// A detection without a severity grade; it counts as info.
    pub fn unrated(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: None,
            ..Self::new(category, Severity::Info, message)
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Look up an agent-specific string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Bucket this finding counts towards; missing severity counts as info.
    pub fn bucket(&self) -> SeverityBucket {
        self.severity
            .map(|s| s.bucket())
            .unwrap_or(SeverityBucket::Info)
    }
}

/// Outcome of a single agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
    Skipped,
    Partial,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Success => write!(f, "success"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Skipped => write!(f, "skipped"),
            AgentStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Result produced for every scheduled agent in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub status: AgentStatus,
    pub findings: Vec<Finding>,
    pub metadata: Metadata,
    /// Wall-clock seconds spent inside the agent.
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visualizations: Vec<Value>,
}

impl AgentResult {
    /// Builds an error-status result; findings and metadata stay empty.
    pub fn failed(agent_name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Error,
            findings: Vec::new(),
            metadata: Metadata::new(),
            execution_time: elapsed.as_secs_f64(),
            error: Some(error.into()),
            visualizations: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == AgentStatus::Error
    }
}

/// Overall status of a report. A report is only ever produced for a
/// completed run, even when every agent failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Success,
}

/// Summary counters of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_findings: usize,
    pub critical_issues: usize,
    pub warnings: usize,
    pub infos: usize,
    pub quality_score: f64,
    pub complexity: Metadata,
}

/// The aggregated outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub summary: ReportSummary,
    pub agent_results: ResultMap,
    pub visualizations: Vec<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle milestone reported to a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Started,
    Running,
    Progress,
    Completed,
}

/// Progress event emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: EventStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn now(status: EventStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

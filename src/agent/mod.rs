//! Analysis agents.
//!
//! Every agent implements [`Agent`]: a pure function from source code to a
//! list of findings. The built-in agents form a closed set ([`AgentKind`])
//! dispatched through [`BuiltinAgent`]; tests and embedders may supply their
//! own implementations.

pub mod complexity;
pub mod error_detector;
pub mod fix_suggester;
pub mod memory;
pub mod quality;
pub mod runner;
pub mod security;
pub mod source;
pub mod visualizer;

use crate::config::Config;
use crate::models::{AgentStatus, Finding, Language, Metadata, ResultMap};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Fault raised by an agent while analyzing code.
#[derive(Debug, Error)]
pub enum AgentError {
    #[allow(dead_code)] // Constructed by injected agents
    #[error("analysis failed: {0}")]
    Failed(String),

    #[error("invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to encode visualization: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Context handed to an agent for one invocation.
///
/// `context` is the caller supplied auxiliary data; `all_findings` is a
/// read-only snapshot of the results merged by earlier stages.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub context: Arc<Metadata>,
    pub all_findings: Arc<ResultMap>,
}

impl AgentContext {
    pub fn new(context: Arc<Metadata>, all_findings: Arc<ResultMap>) -> Self {
        Self {
            context,
            all_findings,
        }
    }

    /// Findings of an earlier agent, if it ran and produced any.
    pub fn findings_of(&self, agent: &str) -> Option<&[Finding]> {
        self.all_findings.get(agent).map(|r| r.findings.as_slice())
    }
}

/// What an agent returns on a normal exit.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub status: AgentStatus,
    pub findings: Vec<Finding>,
    pub metadata: Metadata,
    pub visualizations: Vec<Value>,
}

impl AgentOutput {
    pub fn success(findings: Vec<Finding>, metadata: Metadata) -> Self {
        Self {
            status: AgentStatus::Success,
            findings,
            metadata,
            visualizations: Vec::new(),
        }
    }

    /// The agent declined to analyze this input.
    pub fn skipped(reason: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("message".to_string(), Value::String(reason.into()));
        Self {
            status: AgentStatus::Skipped,
            findings: Vec::new(),
            metadata,
            visualizations: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_visualizations(mut self, visualizations: Vec<Value>) -> Self {
        self.visualizations = visualizations;
        self
    }
}

/// Build agent metadata from key/value pairs.
pub fn metadata<I, K>(entries: I) -> Metadata
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Uniform analysis capability.
pub trait Agent: Send + Sync {
    /// Stable identifier, used as the result map key.
    fn name(&self) -> &str;

    /// Names of agents whose results this agent reads from `all_findings`.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    fn analyze(
        &self,
        code: &str,
        language: Language,
        context: &AgentContext,
    ) -> Result<AgentOutput, AgentError>;
}

/// The built-in agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    ErrorDetector,
    ComplexityAnalyzer,
    MemoryProfiler,
    SecurityAnalyzer,
    QualityChecker,
    AlgorithmVisualizer,
    FixSuggester,
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        AgentKind::ErrorDetector,
        AgentKind::ComplexityAnalyzer,
        AgentKind::MemoryProfiler,
        AgentKind::SecurityAnalyzer,
        AgentKind::QualityChecker,
        AgentKind::AlgorithmVisualizer,
        AgentKind::FixSuggester,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::ErrorDetector => "error_detector",
            AgentKind::ComplexityAnalyzer => "complexity_analyzer",
            AgentKind::MemoryProfiler => "memory_profiler",
            AgentKind::SecurityAnalyzer => "security_analyzer",
            AgentKind::QualityChecker => "quality_checker",
            AgentKind::AlgorithmVisualizer => "algorithm_visualizer",
            AgentKind::FixSuggester => "fix_suggester",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::ErrorDetector => "Error Detector",
            AgentKind::ComplexityAnalyzer => "Complexity Analyzer",
            AgentKind::MemoryProfiler => "Memory Profiler",
            AgentKind::SecurityAnalyzer => "Security Analyzer",
            AgentKind::QualityChecker => "Quality Checker",
            AgentKind::AlgorithmVisualizer => "Algorithm Visualizer",
            AgentKind::FixSuggester => "Fix Suggester",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::ErrorDetector => "Detects syntax, runtime, and logical errors",
            AgentKind::ComplexityAnalyzer => "Analyzes time/space complexity and code metrics",
            AgentKind::MemoryProfiler => "Profiles memory usage and detects leaks",
            AgentKind::SecurityAnalyzer => "Scans for security vulnerabilities",
            AgentKind::QualityChecker => "Checks code quality and best practices",
            AgentKind::AlgorithmVisualizer => "Visualizes algorithms and data structures",
            AgentKind::FixSuggester => "Generates fix suggestions from other agents' findings",
        }
    }

    pub fn dependencies(&self) -> &'static [&'static str] {
        match self {
            AgentKind::FixSuggester => fix_suggester::DEPENDENCIES,
            _ => &[],
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        AgentKind::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A built-in agent together with the settings it needs.
#[derive(Debug, Clone)]
pub struct BuiltinAgent {
    kind: AgentKind,
    max_visualization_steps: usize,
}

impl BuiltinAgent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            max_visualization_steps: visualizer::DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_visualization_steps(mut self, steps: usize) -> Self {
        self.max_visualization_steps = steps;
        self
    }
}

impl Agent for BuiltinAgent {
    fn name(&self) -> &str {
        self.kind.id()
    }

    fn dependencies(&self) -> &[&str] {
        self.kind.dependencies()
    }

    fn analyze(
        &self,
        code: &str,
        language: Language,
        context: &AgentContext,
    ) -> Result<AgentOutput, AgentError> {
        match self.kind {
            AgentKind::ErrorDetector => error_detector::analyze(code, language),
            AgentKind::ComplexityAnalyzer => complexity::analyze(code, language),
            AgentKind::MemoryProfiler => memory::analyze(code, language),
            AgentKind::SecurityAnalyzer => security::analyze(code),
            AgentKind::QualityChecker => quality::analyze(code, language),
            AgentKind::AlgorithmVisualizer => {
                visualizer::analyze(code, language, self.max_visualization_steps)
            }
            AgentKind::FixSuggester => Ok(fix_suggester::analyze(context)),
        }
    }
}

/// Build the enabled built-in agents from configuration, in canonical order.
pub fn builtin_agents(config: &Config) -> Vec<Arc<dyn Agent>> {
    AgentKind::ALL
        .into_iter()
        .filter(|kind| config.orchestrator.is_enabled(kind.id()))
        .map(|kind| {
            Arc::new(
                BuiltinAgent::new(kind)
                    .with_max_visualization_steps(config.visualization.max_steps),
            ) as Arc<dyn Agent>
        })
        .collect()
}

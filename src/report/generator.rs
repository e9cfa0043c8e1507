//! Markdown and JSON report generation.
//!
//! This module renders a compiled [`Report`] for humans (Markdown) or
//! machines (pretty-printed JSON).

use crate::analysis::aggregator::{category_distribution, critical_findings, failed_agents};
use crate::models::{AgentResult, AgentStatus, Finding, Report, ReportSummary, Severity};
use anyhow::Result;
use serde_json::Value;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# CodeSwarm Analysis Report\n\n");
    output.push_str(&format!(
        "*Generated: {}*\n\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_attention_section(report));
    output.push_str(&generate_agents_section(report));

    if !report.visualizations.is_empty() {
        output.push_str(&generate_visualizations_section(&report.visualizations));
    }

    // Footer
    output.push_str("---\n\n");
    output.push_str(&format!(
        "*Report generated by CodeSwarm v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    output
}

/// Generate the summary section.
fn generate_summary_section(summary: &ReportSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} Critical | {} Warnings | {} Info | **Total** | Quality Score |\n",
        Severity::Critical.emoji(),
        Severity::Warning.emoji(),
        Severity::Info.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** | {}/100 |\n\n",
        summary.critical_issues,
        summary.warnings,
        summary.infos,
        summary.total_findings,
        summary.quality_score
    ));

    if !summary.complexity.is_empty() {
        section.push_str("### Complexity\n\n");
        section.push_str("| Metric | Value |\n");
        section.push_str("|:---|:---:|\n");
        for (metric, value) in &summary.complexity {
            section.push_str(&format!("| {} | {} |\n", metric, display_value(value)));
        }
        section.push('\n');
    }

    section
}

/// Category breakdown, critical findings and failed agents.
fn generate_attention_section(report: &Report) -> String {
    let mut section = String::new();

    let categories = category_distribution(&report.agent_results);
    if !categories.is_empty() {
        section.push_str("### Findings by Category\n\n");
        section.push_str("| Category | Count |\n");
        section.push_str("|:---|:---:|\n");
        for (category, count) in categories {
            section.push_str(&format!("| {} | {} |\n", category, count));
        }
        section.push('\n');
    }

    let critical = critical_findings(&report.agent_results);
    if !critical.is_empty() {
        section.push_str("### Critical Issues\n\n");
        for (agent, finding) in critical {
            section.push_str(&format!(
                "- **{}** (line {}): {} *[{}]*\n",
                finding.category,
                finding.line,
                finding.message,
                agent
            ));
        }
        section.push('\n');
    }

    let failed = failed_agents(&report.agent_results);
    if !failed.is_empty() {
        section.push_str("### Failed Agents\n\n");
        for result in failed {
            section.push_str(&format!(
                "- `{}`: {}\n",
                result.agent_name,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate one section per agent, in name order.
fn generate_agents_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Agent Results\n\n");

    if report.agent_results.is_empty() {
        section.push_str("No agents were scheduled.\n\n");
        return section;
    }

    for result in report.agent_results.values() {
        section.push_str(&generate_agent_block(result));
    }

    section
}

/// Generate the block for a single agent.
fn generate_agent_block(result: &AgentResult) -> String {
    let mut block = String::new();

    let badge = match result.status {
        AgentStatus::Success => "✅",
        AgentStatus::Partial => "🟠",
        AgentStatus::Skipped => "⏭️",
        AgentStatus::Error => "❌",
    };

    block.push_str(&format!("### {} {}\n\n", badge, result.agent_name));
    block.push_str(&format!(
        "*Status: {} | Time: {:.3}s | Findings: {}*\n\n",
        result.status,
        result.execution_time,
        result.findings.len()
    ));

    if let Some(ref error) = result.error {
        block.push_str(&format!("**Error:** {}\n\n", error));
    }

    if let Some(Value::String(message)) = result.metadata.get("message") {
        block.push_str(&format!("{}\n\n", message));
    }

    if !result.findings.is_empty() {
        block.push_str("| Severity | Line | Category | Message | Suggestion |\n");
        block.push_str("|:---|:---:|:---|:---|:---|\n");
        for finding in &result.findings {
            block.push_str(&generate_finding_row(finding));
        }
        block.push('\n');
    }

    block
}

/// Generate a single findings table row.
fn generate_finding_row(finding: &Finding) -> String {
    let severity = match finding.severity {
        Some(s) => format!("{} {}", s.emoji(), s),
        None => "-".to_string(),
    };
    let line = if finding.line == 0 {
        "-".to_string()
    } else {
        finding.line.to_string()
    };

    format!(
        "| {} | {} | {} | {} | {} |\n",
        severity,
        line,
        escape_cell(&finding.category),
        escape_cell(&finding.message),
        escape_cell(finding.suggestion.as_deref().unwrap_or(""))
    )
}

fn generate_visualizations_section(visualizations: &[Value]) -> String {
    let mut section = String::new();

    section.push_str("## Visualizations\n\n");
    for viz in visualizations {
        let kind = viz.get("type").and_then(Value::as_str).unwrap_or("unknown");
        let algorithm = viz.get("algorithm").and_then(Value::as_str);
        match algorithm {
            Some(name) => section.push_str(&format!("- {} ({})\n", kind, name)),
            None => section.push_str(&format!("- {}\n", kind)),
        }
    }
    section.push('\n');

    section
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::compile;
    use crate::models::{Metadata, ResultMap};
    use serde_json::json;
    use std::time::Duration;

    fn create_test_report() -> Report {
        let mut results = ResultMap::new();

        let mut metadata = Metadata::new();
        metadata.insert("quality_score".into(), json!(88));
        results.insert(
            "quality_checker".to_string(),
            AgentResult {
                agent_name: "quality_checker".to_string(),
                status: AgentStatus::Success,
                findings: vec![Finding::new("naming", Severity::Info, "Use snake_case | please")
                    .at_line(4)],
                metadata,
                execution_time: 0.01,
                error: None,
                visualizations: Vec::new(),
            },
        );
        results.insert(
            "error_detector".to_string(),
            AgentResult {
                agent_name: "error_detector".to_string(),
                status: AgentStatus::Success,
                findings: vec![Finding::new("runtime", Severity::Error, "Division by zero detected")
                    .at_line(1)
                    .with_suggestion("Add zero check before division")],
                metadata: Metadata::new(),
                execution_time: 0.02,
                error: None,
                visualizations: Vec::new(),
            },
        );
        results.insert(
            "memory_profiler".to_string(),
            AgentResult::failed("memory_profiler", "timed out after 30s", Duration::from_secs(30)),
        );

        compile(&results)
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report());

        assert!(markdown.contains("# CodeSwarm Analysis Report"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("| 1 | 0 | 1 | **2** | 88/100 |"));
        assert!(markdown.contains("## Agent Results"));
        assert!(markdown.contains("Division by zero detected"));
        assert!(markdown.contains("**Error:** timed out after 30s"));
        assert!(markdown.contains("- `memory_profiler`: timed out after 30s"));
    }

    #[test]
    fn test_agent_sections_sorted_by_name() {
        let markdown = generate_markdown_report(&create_test_report());
        let error = markdown.find("### ✅ error_detector").unwrap();
        let memory = markdown.find("### ❌ memory_profiler").unwrap();
        let quality = markdown.find("### ✅ quality_checker").unwrap();
        assert!(error < memory && memory < quality);
    }

    #[test]
    fn test_finding_row_escapes_pipes() {
        let row = generate_finding_row(&Finding::new("naming", Severity::Info, "a | b"));
        assert!(row.contains("a \\| b"));
        assert!(row.starts_with("| 🔵 info | - |"));
    }

    #[test]
    fn test_unrated_finding_row() {
        let row = generate_finding_row(&Finding::unrated("algorithm", "Bubble sort"));
        assert!(row.starts_with("| - |"));
    }

    #[test]
    fn test_empty_report() {
        let markdown = generate_markdown_report(&compile(&ResultMap::new()));
        assert!(markdown.contains("No agents were scheduled."));
        assert!(!markdown.contains("### Failed Agents"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], json!("success"));
        assert_eq!(value["summary"]["critical_issues"], json!(1));
        assert_eq!(value["summary"]["quality_score"], json!(88.0));
        assert_eq!(
            value["agent_results"]["memory_profiler"]["status"],
            json!("error")
        );
    }
}

//! Result aggregation and statistics.
//!
//! This module reduces the per-agent result map of a run into the final
//! report and provides the grouping helpers used by the renderers.

use crate::models::{
    AgentResult, Finding, Report, ReportStatus, ReportSummary, ResultMap, SeverityBucket,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

const VISUALIZER: &str = "algorithm_visualizer";
const QUALITY: &str = "quality_checker";
const COMPLEXITY: &str = "complexity_analyzer";

/// Build the report for a completed run.
///
/// Pure apart from the timestamp. Missing agents fall back to defaults:
/// no visualizations, a quality score of 0 and empty complexity metrics.
pub fn compile(results: &ResultMap) -> Report {
    let mut summary = ReportSummary::default();

    for finding in results.values().flat_map(|r| &r.findings) {
        summary.total_findings += 1;
        match finding.bucket() {
            SeverityBucket::Critical => summary.critical_issues += 1,
            SeverityBucket::Warning => summary.warnings += 1,
            SeverityBucket::Info => summary.infos += 1,
        }
    }

    summary.quality_score = results
        .get(QUALITY)
        .and_then(|r| r.metadata.get("quality_score"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    summary.complexity = results
        .get(COMPLEXITY)
        .map(|r| r.metadata.clone())
        .unwrap_or_default();

    let visualizations = results
        .get(VISUALIZER)
        .filter(|r| !r.is_error())
        .map(|r| r.visualizations.clone())
        .unwrap_or_default();

    Report {
        status: ReportStatus::Success,
        summary,
        agent_results: results.clone(),
        visualizations,
        timestamp: Utc::now(),
    }
}

/// Every finding of the run, tagged with the agent that reported it.
pub fn all_findings(results: &ResultMap) -> Vec<(&str, &Finding)> {
    results
        .iter()
        .flat_map(|(name, r)| r.findings.iter().map(move |f| (name.as_str(), f)))
        .collect()
}

/// Number of findings per category, most frequent first.
pub fn category_distribution(results: &ResultMap) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, finding) in all_findings(results) {
        *counts.entry(finding.category.as_str()).or_default() += 1;
    }

    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    distribution
}

/// Findings in the critical bucket, in agent then detection order.
pub fn critical_findings(results: &ResultMap) -> Vec<(&str, &Finding)> {
    all_findings(results)
        .into_iter()
        .filter(|(_, f)| f.bucket() == SeverityBucket::Critical)
        .collect()
}

/// Agents whose run ended in an error.
pub fn failed_agents(results: &ResultMap) -> Vec<&AgentResult> {
    results.values().filter(|r| r.is_error()).collect()
}

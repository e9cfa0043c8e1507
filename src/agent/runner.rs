//! Fault isolating wrapper around a single agent invocation.

use super::{Agent, AgentContext};
use crate::models::{AgentResult, Language};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info};

/// Run one agent, timing it and converting any fault into an error result.
///
/// Both an `Err` from `analyze` and a panic inside it become a result with
/// status `error`, empty findings and the elapsed time up to the fault.
/// This function never panics on behalf of the agent.
pub fn run(agent: &dyn Agent, code: &str, language: Language, context: &AgentContext) -> AgentResult {
    let name = agent.name().to_string();
    info!(agent = %name, "Starting analysis for {}", language);
    debug!(
        agent = %name,
        context_keys = context.context.len(),
        prior_results = context.all_findings.len(),
        "Agent context prepared"
    );

    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| agent.analyze(code, language, context)));
    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_millis() as u64;

    match outcome {
        Ok(Ok(output)) => {
            info!(
                agent = %name,
                elapsed_ms,
                findings = output.findings.len(),
                "Completed with status {}",
                output.status
            );
            AgentResult {
                agent_name: name,
                status: output.status,
                findings: output.findings,
                metadata: output.metadata,
                execution_time: elapsed.as_secs_f64(),
                error: None,
                visualizations: output.visualizations,
            }
        }
        Ok(Err(e)) => {
            error!(agent = %name, elapsed_ms, "Agent failed: {}", e);
            AgentResult::failed(name, e.to_string(), elapsed)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(agent = %name, elapsed_ms, "Agent panicked: {}", message);
            debug!(agent = %name, "Panic converted into an error result");
            AgentResult::failed(name, format!("agent panicked: {}", message), elapsed)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

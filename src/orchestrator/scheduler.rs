//! Staged, concurrent execution of the agent set.

use super::notifier::{dispatch, Notifier};
use super::plan::{self, PlanError, Stage};
use crate::agent::{builtin_agents, runner, Agent, AgentContext};
use crate::analysis::aggregator;
use crate::config::Config;
use crate::models::{AgentResult, EventStatus, Language, Metadata, Report, ResultMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs agents stage by stage and aggregates their results.
///
/// Each `analyze` call is one independent run: it starts, executes every
/// stage in order and completes with a report. Runs share nothing but the
/// agent set, so a scheduler may serve concurrent requests.
pub struct Scheduler {
    stages: Vec<Stage>,
    agent_timeout: Duration,
}

impl Scheduler {
    /// Plan stages for `agents`. Fails on a dependency cycle or a
    /// duplicated agent name.
    pub fn new(agents: Vec<Arc<dyn Agent>>, agent_timeout: Duration) -> Result<Self, PlanError> {
        let stages = plan::stages(&agents)?;
        debug!(
            "Planned {} stage(s) for {} agent(s)",
            stages.len(),
            agents.len()
        );
        Ok(Self {
            stages,
            agent_timeout,
        })
    }

    /// Scheduler over the built-in agents enabled in `config`.
    pub fn from_config(config: &Config) -> Result<Self, PlanError> {
        Self::new(
            builtin_agents(config),
            Duration::from_secs(config.orchestrator.agent_timeout_seconds),
        )
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn agent_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub async fn analyze(&self, code: &str, language: Language, context: Metadata) -> Report {
        self.analyze_with_progress(code, language, context, None)
            .await
    }

    /// Analyze `code`, reporting milestones to `notifier`.
    pub async fn analyze_with_progress(
        &self,
        code: &str,
        language: Language,
        context: Metadata,
        notifier: Option<&dyn Notifier>,
    ) -> Report {
        let span = info_span!("analysis", %language, agents = self.agent_count());
        self.execute(Arc::from(code), language, Arc::new(context), notifier)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        code: Arc<str>,
        language: Language,
        context: Arc<Metadata>,
        notifier: Option<&dyn Notifier>,
    ) -> Report {
        info!("Starting multi-agent analysis for {}", language);
        dispatch(notifier, EventStatus::Started, "Initiating analysis workflow");

        let started = Instant::now();
        let mut results = ResultMap::new();
        for (idx, stage) in self.stages.iter().enumerate() {
            info!(
                "Executing stage {}/{} ({} agents)",
                idx + 1,
                self.stages.len(),
                stage.len()
            );
            self.run_stage(stage, &code, language, &context, &mut results, notifier)
                .await;
        }

        let report = aggregator::compile(&results);
        info!(
            "Analysis complete in {:.2}s: {} findings",
            started.elapsed().as_secs_f64(),
            report.summary.total_findings
        );
        dispatch(notifier, EventStatus::Completed, "Analysis complete");
        report
    }

    /// Run one stage to completion, merging each result as it arrives.
    async fn run_stage(
        &self,
        stage: &Stage,
        code: &Arc<str>,
        language: Language,
        context: &Arc<Metadata>,
        results: &mut ResultMap,
        notifier: Option<&dyn Notifier>,
    ) {
        let snapshot = Arc::new(results.clone());
        let mut tasks = JoinSet::new();

        for agent in stage {
            dispatch(
                notifier,
                EventStatus::Running,
                format!("Running {}", agent.name()),
            );
            let agent_context = AgentContext::new(Arc::clone(context), Arc::clone(&snapshot));
            tasks.spawn(run_with_timeout(
                Arc::clone(agent),
                Arc::clone(code),
                language,
                agent_context,
                self.agent_timeout,
            ));
        }

        // Sole writer of the result map for this stage
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    let name = result.agent_name.clone();
                    results.insert(name.clone(), result);
                    dispatch(notifier, EventStatus::Progress, format!("{} completed", name));
                }
                Err(e) => error!("Agent task aborted: {}", e),
            }
        }

        for agent in stage {
            if !results.contains_key(agent.name()) {
                let result =
                    AgentResult::failed(agent.name(), "agent task aborted", Duration::ZERO);
                results.insert(agent.name().to_string(), result);
                dispatch(
                    notifier,
                    EventStatus::Progress,
                    format!("{} completed", agent.name()),
                );
            }
        }
    }
}

/// Run an agent on the blocking pool, giving up after `timeout`.
///
/// A timed out agent keeps running on its pool thread; its output is
/// discarded.
async fn run_with_timeout(
    agent: Arc<dyn Agent>,
    code: Arc<str>,
    language: Language,
    context: AgentContext,
    timeout: Duration,
) -> AgentResult {
    let name = agent.name().to_string();
    let start = Instant::now();
    let handle =
        tokio::task::spawn_blocking(move || runner::run(agent.as_ref(), &code, language, &context));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(agent = %name, "Agent task failed: {}", e);
            AgentResult::failed(name, format!("agent task failed: {}", e), start.elapsed())
        }
        Err(_) => {
            warn!(agent = %name, "Agent timed out after {:?}", timeout);
            AgentResult::failed(
                name,
                format!("timed out after {}s", timeout.as_secs_f64()),
                start.elapsed(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentError, AgentOutput};
    use crate::models::{AgentStatus, Finding, ProgressEvent, ReportStatus, Severity};
    use crate::orchestrator::notifier::NotifyError;
    use rand::Rng;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Behavior {
        Succeed,
        Sleep(Duration),
        Fail,
        Panic,
        /// Records the keys visible in `all_findings`.
        Record(Arc<Mutex<Vec<String>>>),
    }

    struct ScriptedAgent {
        name: String,
        deps: Vec<&'static str>,
        behavior: Behavior,
    }

    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> &[&str] {
            &self.deps
        }

        fn analyze(
            &self,
            _code: &str,
            _language: Language,
            context: &AgentContext,
        ) -> Result<AgentOutput, AgentError> {
            match &self.behavior {
                Behavior::Succeed => {}
                Behavior::Sleep(d) => std::thread::sleep(*d),
                Behavior::Fail => return Err(AgentError::Failed("boom".to_string())),
                Behavior::Panic => panic!("scripted panic"),
                Behavior::Record(seen) => {
                    let mut seen = seen.lock().unwrap();
                    seen.extend(context.all_findings.keys().cloned());
                }
            }
            Ok(AgentOutput::success(
                vec![Finding::new("scripted", Severity::Warning, "seen")],
                Default::default(),
            ))
        }
    }

    fn scripted(name: &str, behavior: Behavior) -> Arc<dyn Agent> {
        scripted_with_deps(name, &[], behavior)
    }

    fn scripted_with_deps(name: &str, deps: &[&'static str], behavior: Behavior) -> Arc<dyn Agent> {
        Arc::new(ScriptedAgent {
            name: name.to_string(),
            deps: deps.to_vec(),
            behavior,
        })
    }

    fn scheduler(agents: Vec<Arc<dyn Agent>>) -> Scheduler {
        Scheduler::new(agents, Duration::from_secs(5)).unwrap()
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<ProgressEvent>>);

    impl Notifier for Recording {
        fn notify(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _event: &ProgressEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Disconnected)
        }
    }

    #[tokio::test]
    async fn test_every_agent_has_one_entry() {
        let s = scheduler(vec![
            scripted("a", Behavior::Succeed),
            scripted("b", Behavior::Fail),
            scripted("c", Behavior::Panic),
            scripted_with_deps("d", &["a", "b"], Behavior::Succeed),
        ]);
        let report = s.analyze("x", Language::Python, Metadata::new()).await;
        let keys: Vec<&str> = report.agent_results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_failing_agent_does_not_stop_run() {
        let s = scheduler(vec![
            scripted("ok", Behavior::Succeed),
            scripted("bad", Behavior::Fail),
            scripted("worse", Behavior::Panic),
        ]);
        let report = s.analyze("x", Language::Python, Metadata::new()).await;

        assert_eq!(report.status, ReportStatus::Success);
        for name in ["bad", "worse"] {
            let entry = &report.agent_results[name];
            assert_eq!(entry.status, AgentStatus::Error);
            assert!(entry.findings.is_empty());
            assert!(entry.error.is_some());
        }
        assert_eq!(report.agent_results["ok"].status, AgentStatus::Success);
        assert_eq!(report.summary.total_findings, 1);
    }

    #[tokio::test]
    async fn test_dependent_stage_sees_earlier_results() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = scheduler(vec![
            scripted_with_deps("late", &["a", "b"], Behavior::Record(Arc::clone(&seen))),
            scripted("a", Behavior::Sleep(Duration::from_millis(20))),
            scripted("b", Behavior::Fail),
            scripted("c", Behavior::Succeed),
        ]);
        assert_eq!(s.stages().len(), 2);

        s.analyze("x", Language::Python, Metadata::new()).await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_stage_sees_empty_map() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = scheduler(vec![
            scripted("a", Behavior::Succeed),
            scripted("rec", Behavior::Record(Arc::clone(&seen))),
        ]);
        s.analyze("x", Language::Python, Metadata::new()).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_completions_under_random_delays() {
        for _ in 0..5 {
            let agents: Vec<Arc<dyn Agent>> = (0..16)
                .map(|i| {
                    let delay = rand::thread_rng().gen_range(0..15);
                    scripted(
                        &format!("agent_{:02}", i),
                        Behavior::Sleep(Duration::from_millis(delay)),
                    )
                })
                .collect();
            let s = scheduler(agents);
            let report = s.analyze("x", Language::Python, Metadata::new()).await;
            assert_eq!(report.agent_results.len(), 16);
            assert_eq!(report.summary.total_findings, 16);
        }
    }

    #[tokio::test]
    async fn test_slow_agent_times_out() {
        let s = Scheduler::new(
            vec![
                scripted("slow", Behavior::Sleep(Duration::from_millis(500))),
                scripted("fast", Behavior::Succeed),
            ],
            Duration::from_millis(50),
        )
        .unwrap();
        let report = s.analyze("x", Language::Python, Metadata::new()).await;

        let slow = &report.agent_results["slow"];
        assert_eq!(slow.status, AgentStatus::Error);
        assert_eq!(slow.error.as_deref(), Some("timed out after 0.05s"));
        assert!(slow.findings.is_empty());
        assert_eq!(report.agent_results["fast"].status, AgentStatus::Success);
    }

    #[tokio::test]
    async fn test_notifier_sees_milestones_in_order() {
        let s = scheduler(vec![
            scripted("a", Behavior::Succeed),
            scripted("b", Behavior::Sleep(Duration::from_millis(5))),
            scripted_with_deps("c", &["a"], Behavior::Succeed),
        ]);
        let recording = Recording::default();
        s.analyze_with_progress("x", Language::Python, Metadata::new(), Some(&recording))
            .await;

        let events = recording.0.lock().unwrap().clone();
        let statuses: Vec<EventStatus> = events.iter().map(|e| e.status).collect();
        assert_eq!(statuses.len(), 8);
        assert_eq!(statuses[0], EventStatus::Started);
        assert_eq!(statuses[7], EventStatus::Completed);

        let position = |message: &str| events.iter().position(|e| e.message == message).unwrap();
        for name in ["a", "b", "c"] {
            assert!(position(&format!("Running {}", name)) < position(&format!("{} completed", name)));
        }
        // stage barrier
        assert!(position("b completed") < position("Running c"));
    }

    #[tokio::test]
    async fn test_failing_notifier_is_ignored() {
        let s = scheduler(vec![scripted("a", Behavior::Succeed), scripted("b", Behavior::Fail)]);
        let report = s
            .analyze_with_progress("x", Language::Python, Metadata::new(), Some(&Broken))
            .await;
        assert_eq!(report.agent_results.len(), 2);
        assert_eq!(report.status, ReportStatus::Success);
    }

    #[tokio::test]
    async fn test_cycle_rejected_at_construction() {
        let result = Scheduler::new(
            vec![
                scripted_with_deps("a", &["b"], Behavior::Succeed),
                scripted_with_deps("b", &["a"], Behavior::Succeed),
            ],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(PlanError::Cycle(_))));
    }

    #[tokio::test]
    async fn test_division_by_zero_end_to_end() {
        let s = Scheduler::from_config(&Config::default()).unwrap();
        let report = s.analyze("print(1/0)", Language::Python, Metadata::new()).await;

        assert_eq!(report.agent_results.len(), 7);
        let detector = &report.agent_results["error_detector"];
        let division = detector
            .findings
            .iter()
            .find(|f| f.message.contains("Division by zero"))
            .expect("division by zero finding");
        assert_eq!(division.line, 1);
        assert_eq!(division.category, "runtime");
        assert!(report.summary.critical_issues >= 1);

        let fixes = &report.agent_results["fix_suggester"];
        assert!(fixes.findings.iter().any(|f| f.message == "Division by zero"));
    }

    #[tokio::test]
    async fn test_python_fixture_end_to_end() {
        let s = Scheduler::from_config(&Config::default()).unwrap();
        let code = include_str!("../../fixtures/buggy.py");
        let report = s.analyze(code, Language::Python, Metadata::new()).await;

        assert!(report
            .agent_results
            .values()
            .all(|r| r.status == AgentStatus::Success));

        let fixes: Vec<&str> = report.agent_results["fix_suggester"]
            .findings
            .iter()
            .map(|f| f.message.as_str())
            .collect();
        for expected in [
            "Division by zero",
            "Quadratic time complexity",
            "SQL Injection vulnerability",
            "Hardcoded credentials",
        ] {
            assert!(fixes.contains(&expected), "missing fix: {}", expected);
        }
        assert!(report.summary.critical_issues >= 2);
    }

    #[tokio::test]
    async fn test_cpp_fixture_end_to_end() {
        let s = Scheduler::from_config(&Config::default()).unwrap();
        let code = include_str!("../../fixtures/leaky.cpp");
        let report = s.analyze(code, Language::Cpp, Metadata::new()).await;

        let detector = &report.agent_results["error_detector"];
        let leak = detector
            .findings
            .iter()
            .find(|f| f.category == "memory")
            .expect("memory leak finding");
        assert_eq!(leak.line, 5);
        assert!(detector.findings.iter().any(|f| f.line == 2));

        assert_eq!(
            report.agent_results["algorithm_visualizer"].status,
            AgentStatus::Skipped
        );
        assert_eq!(
            report.agent_results["memory_profiler"].status,
            AgentStatus::Partial
        );
        assert!(report.visualizations.is_empty());
    }

    #[tokio::test]
    async fn test_always_failing_agent_end_to_end() {
        let mut agents = builtin_agents(&Config::default());
        agents.push(scripted("always_fails", Behavior::Fail));
        let s = scheduler(agents);
        let report = s.analyze("x = 1", Language::Python, Metadata::new()).await;

        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.agent_results.len(), 8);
        assert_eq!(report.agent_results["always_fails"].status, AgentStatus::Error);
    }

    #[tokio::test]
    async fn test_disabled_dependency_still_runs_dependent() {
        let mut config = Config::default();
        config.orchestrator.enabled_agents = vec![
            "complexity_analyzer".to_string(),
            "fix_suggester".to_string(),
        ];
        let s = Scheduler::from_config(&config).unwrap();
        let report = s.analyze("print(1/0)", Language::Python, Metadata::new()).await;

        let keys: Vec<&str> = report.agent_results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["complexity_analyzer", "fix_suggester"]);
        assert_eq!(report.agent_results["fix_suggester"].status, AgentStatus::Success);
    }
}

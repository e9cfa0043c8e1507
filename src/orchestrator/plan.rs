//! Stage planning: topological layering of agents by declared dependencies.

use crate::agent::Agent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// An ordered group of agents that may run concurrently.
pub type Stage = Vec<Arc<dyn Agent>>;

/// Invalid agent set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("dependency cycle between agents: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("agent '{0}' is registered more than once")]
    DuplicateAgent(String),
}

/// Partition agents into stages (Kahn's algorithm, one layer per stage).
///
/// A stage holds every agent whose known dependencies all sit in earlier
/// stages. Dependencies on agents that are not in the set are ignored.
/// Within a stage, agents keep their registration order.
pub fn stages(agents: &[Arc<dyn Agent>]) -> Result<Vec<Stage>, PlanError> {
    let mut index = HashMap::with_capacity(agents.len());
    for (i, agent) in agents.iter().enumerate() {
        if index.insert(agent.name(), i).is_some() {
            return Err(PlanError::DuplicateAgent(agent.name().to_string()));
        }
    }

    let mut in_degree = vec![0usize; agents.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); agents.len()];
    for (i, agent) in agents.iter().enumerate() {
        let known: HashSet<usize> = agent
            .dependencies()
            .iter()
            .filter_map(|dep| index.get(dep).copied())
            .collect();
        in_degree[i] = known.len();
        for dep in known {
            dependents[dep].push(i);
        }
    }

    let mut placed = vec![false; agents.len()];
    let mut layer: Vec<usize> = (0..agents.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut result = Vec::new();

    while !layer.is_empty() {
        let mut next = Vec::new();
        for &i in &layer {
            placed[i] = true;
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(d);
                }
            }
        }
        result.push(layer.iter().map(|&i| Arc::clone(&agents[i])).collect());
        next.sort_unstable();
        layer = next;
    }

    let stuck: Vec<String> = agents
        .iter()
        .zip(&placed)
        .filter(|(_, done)| !**done)
        .map(|(agent, _)| agent.name().to_string())
        .collect();
    if !stuck.is_empty() {
        return Err(PlanError::Cycle(stuck));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{builtin_agents, AgentContext, AgentError, AgentOutput};
    use crate::config::Config;
    use crate::models::Language;

    struct Node {
        name: &'static str,
        deps: &'static [&'static str],
    }

    impl Agent for Node {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> &[&str] {
            self.deps
        }

        fn analyze(
            &self,
            _code: &str,
            _language: Language,
            _context: &AgentContext,
        ) -> Result<AgentOutput, AgentError> {
            Ok(AgentOutput::success(Vec::new(), Default::default()))
        }
    }

    fn node(name: &'static str, deps: &'static [&'static str]) -> Arc<dyn Agent> {
        Arc::new(Node { name, deps })
    }

    fn plan_error(agents: &[Arc<dyn Agent>]) -> PlanError {
        let Err(err) = stages(agents) else {
            panic!("expected the agent set to be rejected");
        };
        err
    }

    fn names(stages: &[Stage]) -> Vec<Vec<String>> {
        stages
            .iter()
            .map(|s| s.iter().map(|a| a.name().to_string()).collect())
            .collect()
    }

    #[test]
    fn test_builtin_agents_form_two_stages() {
        let plan = stages(&builtin_agents(&Config::default())).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].len(), 6);
        assert_eq!(
            names(&plan)[1],
            vec!["fix_suggester".to_string()]
        );
    }

    #[test]
    fn test_chain_is_three_stages() {
        let plan = stages(&[node("c", &["b"]), node("b", &["a"]), node("a", &[])]).unwrap();
        assert_eq!(names(&plan), vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_unknown_dependency_is_ignored() {
        let plan = stages(&[node("a", &["ghost"]), node("b", &["a", "a"])]).unwrap();
        assert_eq!(names(&plan), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = plan_error(&[node("a", &["b"]), node("b", &["a"]), node("c", &[])]);
        assert_eq!(err, PlanError::Cycle(vec!["a".to_string(), "b".to_string()]));

        let err = plan_error(&[node("self", &["self"])]);
        assert!(matches!(err, PlanError::Cycle(_)));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let err = plan_error(&[node("a", &[]), node("a", &[])]);
        assert_eq!(err, PlanError::DuplicateAgent("a".to_string()));
    }

    #[test]
    fn test_empty_agent_set() {
        assert!(stages(&[]).unwrap().is_empty());
    }
}

//! Algorithm and data structure detection with visualization traces.
//!
//! Traces are computed on fixed sample inputs, not on the analyzed code;
//! they give a front end something to animate for the detected family.

use super::source::{self, compiled, LazyRegex};
use super::{metadata, AgentError, AgentOutput};
use crate::models::{Finding, Language};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Default cap on sorting trace frames.
pub const DEFAULT_MAX_STEPS: usize = 50;

const SORT_SAMPLE: [i64; 7] = [64, 34, 25, 12, 22, 11, 90];
const SEARCH_SAMPLE: [i64; 7] = [11, 12, 22, 25, 34, 64, 90];
const SEARCH_TARGET: i64 = 25;
const SAMPLE_GRAPH: [&[usize]; 6] = [&[1, 2], &[0, 3, 4], &[0, 5], &[1], &[1, 5], &[2, 4]];

type PatternTable = Vec<(&'static str, Regex)>;

static ALGORITHMS: LazyLock<Result<PatternTable, regex::Error>> = LazyLock::new(|| {
    [
        ("bubble_sort", r"for.*in.*range.*:\s*for.*in.*range.*:.*if.*>.*:"),
        ("binary_search", r"while.*<=.*:.*mid.*=.*//"),
        ("merge_sort", r"def.*merge.*:.*def.*merge_sort.*:"),
        ("quick_sort", r"def.*partition.*:.*def.*quick_sort.*:"),
        ("bfs", r"queue.*=.*\[.*\].*while.*queue.*:"),
        ("dfs", r"def.*dfs.*:.*visited"),
        ("dijkstra", r"distance.*=.*infinity.*priority.*queue"),
        ("fibonacci", r"def.*fib.*:.*if.*<=.*1.*:.*return.*fib"),
        ("dynamic_programming", r"dp.*=.*\[.*\].*for.*in.*range"),
    ]
    .into_iter()
    .map(|(name, pattern)| Regex::new(&format!("(?s){}", pattern)).map(|re| (name, re)))
    .collect()
});

static ARRAY: LazyRegex = LazyLock::new(|| Regex::new(r"(?i)list|array|\[\]"));
static TREE: LazyRegex = LazyLock::new(|| Regex::new(r"class.*Node|left.*right|root"));
static GRAPH: LazyRegex = LazyLock::new(|| Regex::new(r"(?i)graph|adjacency|edges|vertices"));
static STACK_QUEUE: LazyRegex = LazyLock::new(|| Regex::new(r"(?i)stack|queue|deque|push|pop"));

fn algorithm_category(name: &str) -> &'static str {
    match name {
        n if n.contains("sort") => "sorting",
        n if n.contains("search") => "searching",
        "bfs" | "dfs" | "dijkstra" => "graph",
        "fibonacci" | "dynamic_programming" => "dynamic_programming",
        _ => "other",
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn analyze(code: &str, language: Language, max_steps: usize) -> Result<AgentOutput, AgentError> {
    if language != Language::Python {
        return Ok(AgentOutput::skipped(
            "Algorithm visualization currently supports Python only",
        ));
    }

    let masked = source::masked_code(code, language);
    let findings = detect(&masked)?;

    let mut visualizations = Vec::new();
    for finding in &findings {
        if let Some(viz) = visualize(finding, max_steps)? {
            visualizations.push(viz);
        }
    }

    let meta = metadata([
        ("algorithms_detected", json!(findings.len())),
        ("visualizations_generated", json!(visualizations.len())),
    ]);
    Ok(AgentOutput::success(findings, meta).with_visualizations(visualizations))
}

fn detect(masked: &str) -> Result<Vec<Finding>, AgentError> {
    let algorithms = ALGORITHMS
        .as_ref()
        .map_err(|e| AgentError::Pattern(e.clone()))?;

    let mut findings: Vec<Finding> = algorithms
        .iter()
        .filter(|(_, re)| re.is_match(masked))
        .map(|(name, _)| {
            Finding::unrated(algorithm_category(name), format!("Detected {}", title_case(name)))
                .with_field("algorithm", *name)
                .with_field("confidence", 0.8)
        })
        .collect();

    let structures = [
        (&ARRAY, "array", "Array/List operations detected"),
        (&TREE, "tree", "Tree structure detected"),
        (&GRAPH, "graph", "Graph structure detected"),
        (&STACK_QUEUE, "stack_queue", "Stack/Queue operations detected"),
    ];
    for (pattern, name, message) in structures {
        if compiled(pattern)?.is_match(masked) {
            findings.push(
                Finding::unrated("data_structure", message).with_field("data_structure", name),
            );
        }
    }

    Ok(findings)
}

fn visualize(finding: &Finding, max_steps: usize) -> Result<Option<Value>, AgentError> {
    let name = finding
        .field_str("algorithm")
        .or_else(|| finding.field_str("data_structure"))
        .unwrap_or_default();

    let viz = match (finding.category.as_str(), finding.field_str("data_structure")) {
        ("sorting", _) => serde_json::to_value(sorting_trace(name, max_steps))?,
        ("searching", _) => serde_json::to_value(search_trace(name))?,
        ("graph", _) => serde_json::to_value(graph_trace(name))?,
        (_, Some("tree")) => tree_sample(),
        (_, Some("array")) => array_sample(),
        _ => return Ok(None),
    };
    Ok(Some(viz))
}

#[derive(Debug, Serialize)]
struct SortFrame {
    step: usize,
    array: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparing: Option<[usize; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    swapping: Option<[usize; 2]>,
    sorted: Vec<usize>,
    operation: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct SortingTrace {
    algorithm: String,
    #[serde(rename = "type")]
    kind: &'static str,
    sample_data: Vec<i64>,
    frames: Vec<SortFrame>,
    metrics: Value,
}

/// Bubble sort over the sample array; frames are capped at `max_steps`
/// while the metrics count the whole run.
fn sorting_trace(algorithm: &str, max_steps: usize) -> SortingTrace {
    let mut arr = SORT_SAMPLE.to_vec();
    let n = arr.len();
    let mut frames = Vec::new();
    let (mut comparisons, mut swaps) = (0, 0);

    for i in 0..n {
        let sorted: Vec<usize> = (n - i..n).collect();
        for j in 0..n - i - 1 {
            comparisons += 1;
            frames.push(SortFrame {
                step: frames.len(),
                array: arr.clone(),
                comparing: Some([j, j + 1]),
                swapping: None,
                sorted: sorted.clone(),
                operation: "compare",
                message: format!("Comparing {} and {}", arr[j], arr[j + 1]),
            });

            if arr[j] > arr[j + 1] {
                arr.swap(j, j + 1);
                swaps += 1;
                frames.push(SortFrame {
                    step: frames.len(),
                    array: arr.clone(),
                    comparing: None,
                    swapping: Some([j, j + 1]),
                    sorted: sorted.clone(),
                    operation: "swap",
                    message: format!("Swapped {} and {}", arr[j + 1], arr[j]),
                });
            }
        }
    }
    frames.truncate(max_steps);

    SortingTrace {
        algorithm: algorithm.to_string(),
        kind: "sorting",
        sample_data: SORT_SAMPLE.to_vec(),
        frames,
        metrics: json!({
            "comparisons": comparisons,
            "swaps": swaps,
            "time_complexity": "O(n²)",
            "space_complexity": "O(1)",
        }),
    }
}

#[derive(Debug, Serialize)]
struct SearchFrame {
    step: usize,
    array: Vec<i64>,
    #[serde(flatten)]
    state: SearchState,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SearchState {
    Probe {
        left: usize,
        right: usize,
        mid: usize,
        target: i64,
    },
    Found {
        found: usize,
    },
}

#[derive(Debug, Serialize)]
struct SearchTrace {
    algorithm: String,
    #[serde(rename = "type")]
    kind: &'static str,
    sample_data: Vec<i64>,
    target: i64,
    frames: Vec<SearchFrame>,
    metrics: Value,
}

fn search_trace(algorithm: &str) -> SearchTrace {
    let arr = SEARCH_SAMPLE.to_vec();
    let mut frames = Vec::new();
    let (mut left, mut right) = (0usize, arr.len() - 1);

    while left <= right {
        let mid = (left + right) / 2;
        frames.push(SearchFrame {
            step: frames.len(),
            array: arr.clone(),
            state: SearchState::Probe {
                left,
                right,
                mid,
                target: SEARCH_TARGET,
            },
            message: format!("Checking middle element: {}", arr[mid]),
        });

        if arr[mid] == SEARCH_TARGET {
            frames.push(SearchFrame {
                step: frames.len(),
                array: arr.clone(),
                state: SearchState::Found { found: mid },
                message: format!("Found target {} at index {}", SEARCH_TARGET, mid),
            });
            break;
        } else if arr[mid] < SEARCH_TARGET {
            left = mid + 1;
        } else if mid == 0 {
            break;
        } else {
            right = mid - 1;
        }
    }

    SearchTrace {
        algorithm: algorithm.to_string(),
        kind: "searching",
        sample_data: arr,
        target: SEARCH_TARGET,
        metrics: json!({
            "comparisons": frames.len(),
            "time_complexity": "O(log n)",
            "space_complexity": "O(1)",
        }),
        frames,
    }
}

#[derive(Debug, Serialize)]
struct GraphFrame {
    step: usize,
    current_node: usize,
    visited: Vec<usize>,
    queue: Vec<usize>,
    message: String,
}

#[derive(Debug, Serialize)]
struct GraphTrace {
    algorithm: String,
    #[serde(rename = "type")]
    kind: &'static str,
    graph_data: Value,
    frames: Vec<GraphFrame>,
    metrics: Value,
}

/// Breadth-first traversal of the sample graph from node 0.
fn graph_trace(algorithm: &str) -> GraphTrace {
    let mut frames = Vec::new();
    let mut visited = BTreeSet::new();
    let mut queue = std::collections::VecDeque::from([0usize]);

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        frames.push(GraphFrame {
            step: frames.len(),
            current_node: node,
            visited: visited.iter().copied().collect(),
            queue: queue.iter().copied().collect(),
            message: format!("Visiting node {}", node),
        });
        queue.extend(
            SAMPLE_GRAPH[node]
                .iter()
                .copied()
                .filter(|n| !visited.contains(n)),
        );
    }

    let edges: Vec<[usize; 2]> = SAMPLE_GRAPH
        .iter()
        .enumerate()
        .flat_map(|(from, neighbors)| neighbors.iter().map(move |&to| [from, to]))
        .collect();

    GraphTrace {
        algorithm: algorithm.to_string(),
        kind: "graph",
        graph_data: json!({
            "nodes": (0..SAMPLE_GRAPH.len()).collect::<Vec<_>>(),
            "edges": edges,
        }),
        frames,
        metrics: json!({
            "nodes_visited": visited.len(),
            "time_complexity": "O(V + E)",
            "space_complexity": "O(V)",
        }),
    }
}

fn tree_sample() -> Value {
    json!({
        "data_structure": "tree",
        "type": "tree",
        "sample_data": {
            "root": 50,
            "nodes": [
                {"value": 50, "left": 30, "right": 70},
                {"value": 30, "left": 20, "right": 40},
                {"value": 70, "left": 60, "right": 80},
            ],
        },
        "message": "Binary tree structure detected",
    })
}

fn array_sample() -> Value {
    json!({
        "data_structure": "array",
        "type": "array",
        "sample_data": [10, 20, 30, 40, 50],
        "message": "Array structure detected",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentStatus;

    const BUBBLE_SORT: &str = "\
def bubble_sort(arr):
    n = len(arr)
    for i in range(n):
        for j in range(0, n - i - 1):
            if arr[j] > arr[j + 1]:
                arr[j], arr[j + 1] = arr[j + 1], arr[j]
    return arr
";

    #[test]
    fn test_non_python_is_skipped() {
        let output = analyze("int main() {}", Language::C, DEFAULT_MAX_STEPS).unwrap();
        assert_eq!(output.status, AgentStatus::Skipped);
        assert!(output.findings.is_empty());
        assert!(output.visualizations.is_empty());
        assert_eq!(
            output.metadata["message"],
            json!("Algorithm visualization currently supports Python only")
        );
    }

    #[test]
    fn test_bubble_sort_detected_and_traced() {
        let output = analyze(BUBBLE_SORT, Language::Python, DEFAULT_MAX_STEPS).unwrap();
        let sorting = output
            .findings
            .iter()
            .find(|f| f.category == "sorting")
            .expect("sorting detection");
        assert_eq!(sorting.message, "Detected Bubble Sort");
        assert_eq!(sorting.severity, None);

        let viz = &output.visualizations[0];
        assert_eq!(viz["type"], json!("sorting"));
        assert_eq!(viz["algorithm"], json!("bubble_sort"));
        // 7 elements: 21 comparisons
        assert_eq!(viz["metrics"]["comparisons"], json!(21));
        assert!(viz["frames"].as_array().unwrap().len() <= DEFAULT_MAX_STEPS);
        assert_eq!(viz["frames"][0]["operation"], json!("compare"));
        assert!(viz["frames"][0].get("swapping").is_none());
    }

    #[test]
    fn test_sorting_frames_capped() {
        let trace = sorting_trace("bubble_sort", 5);
        assert_eq!(trace.frames.len(), 5);
        assert_eq!(trace.frames[4].step, 4);

        let full = sorting_trace("bubble_sort", usize::MAX);
        let last = full.frames.last().unwrap();
        assert_eq!(last.array, vec![11, 12, 22, 25, 34, 64, 90]);
    }

    #[test]
    fn test_binary_search_trace() {
        let trace = search_trace("binary_search");
        let value = serde_json::to_value(&trace).unwrap();
        let frames = value["frames"].as_array().unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last["found"], json!(3));
        assert_eq!(frames[0]["mid"], json!(3));
        assert_eq!(value["metrics"]["comparisons"], json!(frames.len()));
    }

    #[test]
    fn test_graph_trace_visits_every_node_once() {
        let trace = graph_trace("bfs");
        let order: Vec<usize> = trace.frames.iter().map(|f| f.current_node).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(trace.metrics["nodes_visited"], json!(6));
    }

    #[test]
    fn test_data_structures() {
        let code = "class Node:\n    def __init__(self):\n        self.left = None\n        self.right = None\nstack = []\nstack.append(1)";
        let output = analyze(code, Language::Python, DEFAULT_MAX_STEPS).unwrap();
        let structures: Vec<_> = output
            .findings
            .iter()
            .filter_map(|f| f.field_str("data_structure"))
            .collect();
        assert_eq!(structures, vec!["array", "tree", "stack_queue"]);
        let kinds: Vec<_> = output
            .visualizations
            .iter()
            .map(|v| v["type"].clone())
            .collect();
        assert_eq!(kinds, vec![json!("array"), json!("tree")]);
        assert_eq!(output.metadata["visualizations_generated"], json!(2));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("dynamic_programming"), "Dynamic Programming");
        assert_eq!(title_case("bfs"), "Bfs");
    }
}

use serde::Serialize;
use std::fmt::Write;

/// Solver and version from the `[tool-version]` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub solver: String,
    pub version: semver::Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantifierCount {
    pub name: String,
    pub num_vars: usize,
    pub instances: usize,
    /// Pseudo-quantifier for theory-solving or MBQI instances
    pub discovered: bool,
    pub has_var_names: bool,
}

/// A malformed line found while parsing in lenient mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// What a parsed trace contains
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceSummary {
    pub file: String,
    pub version: Option<VersionInfo>,
    pub lines: usize,
    pub terms: usize,
    pub quantifiers: usize,
    pub matches: usize,
    pub discovered_matches: usize,
    pub instances: usize,
    pub dependency_edges: usize,
    pub max_instance_depth: usize,
    /// Instances still open at the end of the trace
    pub open_instances: usize,
    pub search_lines: usize,
    pub unknown_lines: usize,
    pub quantifier_instances: Vec<QuantifierCount>,
    /// At most `max_errors` entries; see `error_count` for the total
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    /// The last line had no newline and did not parse
    pub truncated_tail: bool,
    pub timed_out: bool,
    /// Printed on request only; can be as large as the trace
    #[serde(skip)]
    pub graph: InstantiationGraph,
}

impl TraceSummary {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.error_count == 0
    }

    #[must_use]
    pub fn top_quantifiers(&self, n: usize) -> &[QuantifierCount] {
        &self.quantifier_instances[..n.min(self.quantifier_instances.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// The match blamed a term the producer created
    Term,
    /// The match used an equality asserted by the producer
    Equality,
}

/// One quantifier instance, identified by its `[instance]` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceNode {
    pub line: usize,
    pub quantifier: String,
}

/// `from` produced something the instance at `to` matched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstanceEdge {
    pub from: usize,
    pub to: usize,
    pub kind: DependencyKind,
}

/// Instances of declared quantifiers and their dependencies, in trace order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstantiationGraph {
    pub nodes: Vec<InstanceNode>,
    pub edges: Vec<InstanceEdge>,
}

impl InstantiationGraph {
    /// Graphviz rendering; equality dependencies are dashed
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph instantiations {\n");
        for node in &self.nodes {
            let label = node.quantifier.replace('\\', "\\\\").replace('"', "\\\"");
            let _ = writeln!(out, "    n{} [label=\"{}: {}\"];", node.line, node.line, label);
        }
        for edge in &self.edges {
            let style = match edge.kind {
                DependencyKind::Term => "",
                DependencyKind::Equality => " [style=dashed]",
            };
            let _ = writeln!(out, "    n{} -> n{}{};", edge.from, edge.to, style);
        }
        out.push_str("}\n");
        out
    }
}
